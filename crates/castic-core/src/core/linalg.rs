//! Dense matrix kernels: Wilson B-matrix assembly, Gram-matrix spectra and pseudo-inverses,
//! Cartesian projectors. All Cartesian vectors are flattened atom-major, `[x0, y0, z0, x1, ...]`.

use crate::core::primitives::GradientRow;
use nalgebra::{DMatrix, DVector, Point3, SVD, Vector3};

pub fn flatten(xyz: &[Point3<f64>]) -> DVector<f64> {
    DVector::from_iterator(xyz.len() * 3, xyz.iter().flat_map(|p| [p.x, p.y, p.z]))
}

/// Inverse of [`flatten`]. Trailing components that do not fill a whole atom are ignored.
pub fn unflatten(v: &DVector<f64>) -> Vec<Point3<f64>> {
    v.as_slice()
        .chunks_exact(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect()
}

/// Scatters sparse gradient rows into a dense `rows x 3 * natoms` matrix.
pub fn assemble_bmat(rows: &[GradientRow], natoms: usize) -> DMatrix<f64> {
    let mut b = DMatrix::zeros(rows.len(), 3 * natoms);
    for (r, row) in rows.iter().enumerate() {
        for (atom, g) in row {
            for k in 0..3 {
                b[(r, 3 * atom + k)] += g[k];
            }
        }
    }
    b
}

/// Eigen-decomposition of a Gram matrix `G = A A^T`, read off the SVD of `A`.
///
/// `eigenvalues` are the squared singular values in descending order and the columns of
/// `eigenvectors` the matching left singular vectors. Rows of `A` without any weight are
/// split off before the SVD; they only contribute exact zero eigenvalues.
#[derive(Debug, Clone)]
pub struct GramSpectrum {
    pub eigenvalues: DVector<f64>,
    pub eigenvectors: DMatrix<f64>,
}

impl GramSpectrum {
    pub fn new(a: &DMatrix<f64>) -> Self {
        let n = a.nrows();
        let empty = Self {
            eigenvalues: DVector::zeros(0),
            eigenvectors: DMatrix::zeros(n, 0),
        };
        let row_norms: Vec<f64> = a.row_iter().map(|row| row.norm()).collect();
        let largest = row_norms.iter().copied().fold(0.0, f64::max);
        if a.ncols() == 0 || largest == 0.0 {
            return empty;
        }
        let active: Vec<usize> = (0..n)
            .filter(|&i| row_norms[i] > ZERO_ROW_TOLERANCE * largest)
            .collect();

        let svd = SVD::new(a.select_rows(active.iter()), true, false);
        let Some(u) = svd.u else {
            return empty;
        };
        let mut eigenvectors = DMatrix::zeros(n, u.ncols());
        for (r, &i) in active.iter().enumerate() {
            eigenvectors.set_row(i, &u.row(r));
        }
        Self {
            eigenvalues: svd.singular_values.map(|s| s * s),
            eigenvectors,
        }
    }

    pub fn lambda_max(&self) -> f64 {
        self.eigenvalues.iter().copied().fold(0.0, f64::max)
    }

    /// Largest entry of `G V - V Λ`, evaluated without forming `G`.
    pub fn residual(&self, a: &DMatrix<f64>) -> f64 {
        let gv = a * (a.transpose() * &self.eigenvectors);
        let v_lambda = &self.eigenvectors * DMatrix::from_diagonal(&self.eigenvalues);
        (gv - v_lambda).amax()
    }

    /// Moore-Penrose pseudo-inverse of `G`. Eigenvalues at or below
    /// `tolerance * lambda_max` are treated as zero.
    pub fn pseudo_inverse(&self, tolerance: f64) -> DMatrix<f64> {
        let n = self.eigenvectors.nrows();
        let mut inverse = DMatrix::zeros(n, n);
        let cutoff = tolerance * self.lambda_max();
        for (i, &lambda) in self.eigenvalues.iter().enumerate() {
            if lambda > 0.0 && lambda > cutoff {
                let v = self.eigenvectors.column(i);
                inverse += v * v.transpose() / lambda;
            }
        }
        inverse
    }
}

/// Rows of `A` whose norm is below this fraction of the largest row norm count as empty.
const ZERO_ROW_TOLERANCE: f64 = 1e-14;

/// Pseudo-inverse of `A A^T`.
pub fn pseudo_inverse_gram(a: &DMatrix<f64>, tolerance: f64) -> DMatrix<f64> {
    GramSpectrum::new(a).pseudo_inverse(tolerance)
}

/// `3N x 3N` projector that removes rigid-body translation and rotation of the whole system.
pub fn external_motion_projector(xyz: &[Point3<f64>]) -> DMatrix<f64> {
    let n = xyz.len();
    let dim = 3 * n;
    if n == 0 {
        return DMatrix::zeros(0, 0);
    }
    let center = xyz.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n as f64;

    let mut basis = DMatrix::zeros(dim, 6);
    for (i, p) in xyz.iter().enumerate() {
        let r = p.coords - center;
        for k in 0..3 {
            basis[(3 * i + k, k)] = 1.0;
            let mut axis = Vector3::zeros();
            axis[k] = 1.0;
            let rot = axis.cross(&r);
            for m in 0..3 {
                basis[(3 * i + m, 3 + k)] = rot[m];
            }
        }
    }

    let overlap_inv = pseudo_inverse_gram(&basis.transpose(), 1e-10);
    DMatrix::identity(dim, dim) - &basis * overlap_inv * basis.transpose()
}
