use crate::core::error::CoordinateError;
use crate::core::linalg::GramSpectrum;
use crate::core::primitives::PrimitiveKind;
use crate::core::primitives::builder::PrimitiveInternalCoordinates;
use nalgebra::{DMatrix, DVector, Point3};
use tracing::{debug, info, instrument, warn};

/// Largest perpendicular deviation (Bohr) for which a fragment still counts as linear.
const LINEAR_FRAGMENT_TOLERANCE: f64 = 1e-3;

/// Largest entry of `G V - V Λ` accepted, relative to `max(lambda_max, 1)`.
const DECOMPOSITION_TOLERANCE: f64 = 1e-8;

/// Non-redundant linear combinations of the primitive coordinates.
#[derive(Debug, Clone)]
pub struct DelocalizedBasis {
    /// `n_primitives x k`, columns ordered by descending G-matrix eigenvalue.
    del_mat: DMatrix<f64>,
    eigenvalues: DVector<f64>,
    expected_dimension: usize,
    reference: Vec<Point3<f64>>,
}

impl DelocalizedBasis {
    /// Basis with caller-chosen columns, bypassing the G-matrix decomposition.
    #[cfg(test)]
    pub(crate) fn from_columns(del_mat: DMatrix<f64>, reference: &[Point3<f64>]) -> Self {
        let k = del_mat.ncols();
        Self {
            del_mat,
            eigenvalues: DVector::zeros(k),
            expected_dimension: k,
            reference: reference.to_vec(),
        }
    }

    pub fn del_mat(&self) -> &DMatrix<f64> {
        &self.del_mat
    }

    pub fn eigenvalues(&self) -> &DVector<f64> {
        &self.eigenvalues
    }

    /// Number of delocalized coordinates.
    pub fn dimension(&self) -> usize {
        self.del_mat.ncols()
    }

    pub fn expected_dimension(&self) -> usize {
        self.expected_dimension
    }

    /// Geometry (Bohr) the basis was computed at.
    pub fn reference(&self) -> &[Point3<f64>] {
        &self.reference
    }

    /// Largest atomic displacement of `xyz` from the reference geometry.
    pub fn max_displacement(&self, xyz: &[Point3<f64>]) -> f64 {
        self.reference
            .iter()
            .zip(xyz)
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max)
    }
}

/// Diagonalizes the G-matrix at `xyz` through the SVD of the primitive B-matrix and keeps the
/// eigenvectors whose eigenvalue exceeds `tolerance` times the largest one.
///
/// A decomposition that does not reproduce `G V = V Λ` is rejected instead of yielding a
/// basis with a missing direction.
#[instrument(skip_all, name = "delocalize")]
pub fn delocalize(
    primitives: &PrimitiveInternalCoordinates,
    xyz: &[Point3<f64>],
    tolerance: f64,
) -> Result<DelocalizedBasis, CoordinateError> {
    let b = primitives.bmat(xyz)?;
    let n = b.nrows();
    let expected_dimension = expected_dimension(primitives, xyz);
    if n == 0 {
        debug!("Primitive set is empty; delocalized basis has no coordinates");
        return Ok(DelocalizedBasis {
            del_mat: DMatrix::zeros(0, 0),
            eigenvalues: DVector::zeros(0),
            expected_dimension,
            reference: xyz.to_vec(),
        });
    }
    let spectrum = GramSpectrum::new(&b);
    let lambda_max = spectrum.lambda_max();
    let residual = spectrum.residual(&b);
    if residual.is_nan() || residual > DECOMPOSITION_TOLERANCE * lambda_max.max(1.0) {
        warn!(residual, lambda_max, "G-matrix eigenpairs fail the residual check");
        return Err(CoordinateError::InaccurateDecomposition { residual });
    }
    let cutoff = tolerance * lambda_max;

    let kept: Vec<usize> = (0..spectrum.eigenvalues.len())
        .filter(|&i| lambda_max > 0.0 && spectrum.eigenvalues[i] > cutoff)
        .collect();

    let mut del_mat = DMatrix::zeros(n, kept.len());
    for (col, &i) in kept.iter().enumerate() {
        let mut v = spectrum.eigenvectors.column(i).into_owned();
        let pivot = v.iamax();
        if v[pivot] < 0.0 {
            v.neg_mut();
        }
        del_mat.set_column(col, &v);
    }
    let eigenvalues =
        DVector::from_iterator(kept.len(), kept.iter().map(|&i| spectrum.eigenvalues[i]));

    if kept.len() != expected_dimension {
        info!(
            found = kept.len(),
            expected = expected_dimension,
            "Delocalized dimension differs from the expected degrees of freedom"
        );
    }
    debug!(
        primitives = n,
        delocalized = kept.len(),
        "Computed delocalized internal coordinates"
    );

    Ok(DelocalizedBasis {
        del_mat,
        eigenvalues,
        expected_dimension,
        reference: xyz.to_vec(),
    })
}

/// Degrees of freedom the primitive set should span at `xyz`.
///
/// With translation and rotation coordinates every fragment spans its full Cartesian space.
/// Without them each fragment contributes `3n - 6`, or `3n - 5` when linear.
pub fn expected_dimension(primitives: &PrimitiveInternalCoordinates, xyz: &[Point3<f64>]) -> usize {
    if primitives.count(PrimitiveKind::Translation) > 0 {
        return 3 * primitives.natoms();
    }
    primitives
        .fragments()
        .iter()
        .map(|fragment| {
            let n = fragment.len();
            match n {
                0 | 1 => 0,
                2 => 1,
                _ => {
                    let points: Vec<_> = fragment.iter().map(|&i| xyz[i]).collect();
                    if is_linear_fragment(&points) {
                        3 * n - 5
                    } else {
                        3 * n - 6
                    }
                }
            }
        })
        .sum()
}

fn is_linear_fragment(points: &[Point3<f64>]) -> bool {
    let Some((a, b)) = farthest_pair(points) else {
        return true;
    };
    let axis = points[b] - points[a];
    let length = axis.norm();
    if length == 0.0 {
        return true;
    }
    let axis = axis / length;
    points.iter().all(|p| {
        let r = p - points[a];
        (r - axis * r.dot(&axis)).norm() < LINEAR_FRAGMENT_TOLERANCE
    })
}

fn farthest_pair(points: &[Point3<f64>]) -> Option<(usize, usize)> {
    let mut best = None;
    let mut best_distance = -1.0;
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let d = (points[j] - points[i]).norm_squared();
            if d > best_distance {
                best_distance = d;
                best = Some((i, j));
            }
        }
    }
    best
}
