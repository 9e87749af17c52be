use super::{GradientRow, Primitive, PrimitiveKind, Rotator, hessian};
use crate::core::error::{ConstructionError, CoordinateError, DegeneracyError};
use crate::core::linalg;
use crate::core::models::element::Element;
use crate::core::models::topology::BondGraph;
use crate::core::utils::geometry;
use nalgebra::{DMatrix, DVector, Point3};
use std::collections::HashSet;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const DEFAULT_LINEAR_ANGLE_THRESHOLD: f64 = 0.95 * PI;

/// Which primitive families to generate and when an angle counts as linear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveOptions {
    /// Angles above this value, or below `pi` minus it, are replaced by two linear bends.
    pub linear_angle_threshold: f64,
    pub include_out_of_plane: bool,
    /// Add per-fragment translation and rotation coordinates.
    pub include_external: bool,
}

impl Default for PrimitiveOptions {
    fn default() -> Self {
        Self {
            linear_angle_threshold: DEFAULT_LINEAR_ANGLE_THRESHOLD,
            include_out_of_plane: true,
            include_external: false,
        }
    }
}

/// The redundant set of primitive internal coordinates of a molecular system.
///
/// Built once from a bond graph snapshot; a new geometry topology needs a new instance.
#[derive(Debug, Clone)]
pub struct PrimitiveInternalCoordinates {
    primitives: Vec<Primitive>,
    elements: Vec<Element>,
    fragments: Vec<Vec<usize>>,
}

impl PrimitiveInternalCoordinates {
    /// Builds the primitive set for `graph` at the Bohr geometry `xyz`.
    ///
    /// Order: distances, angles or linear bends, dihedrals, out-of-plane coordinates, then
    /// per fragment the translations and rotations.
    #[instrument(skip_all, name = "primitive_set_build")]
    pub fn build(
        graph: &BondGraph,
        elements: &[Element],
        xyz: &[Point3<f64>],
        options: &PrimitiveOptions,
    ) -> Result<Self, CoordinateError> {
        let natoms = graph.natoms();
        if elements.len() != natoms {
            return Err(ConstructionError::LengthMismatch {
                elements: elements.len(),
                positions: natoms,
            }
            .into());
        }
        check_positions(natoms, xyz)?;

        let linear = LinearityTest {
            xyz,
            threshold: options.linear_angle_threshold,
        };
        let mut primitives = Vec::new();

        for &(a, b) in graph.edges() {
            primitives.push(Primitive::Distance { a, b });
        }

        for b in 0..natoms {
            let nb = graph.neighbors(b);
            for (ia, &a) in nb.iter().enumerate() {
                for &c in &nb[ia + 1..] {
                    if linear.is_linear(a, b, c)? {
                        let aux = geometry::least_parallel_axis(&xyz[a], &xyz[c]);
                        for axis in 0..2 {
                            primitives.push(Primitive::LinearBend { a, b, c, axis, aux });
                        }
                    } else {
                        primitives.push(Primitive::Angle { a, b, c });
                    }
                }
            }
        }

        add_dihedrals(graph, &linear, &mut primitives)?;

        if options.include_out_of_plane {
            for center in 0..natoms {
                let nb = graph.neighbors(center);
                if nb.len() != 3 {
                    continue;
                }
                let (i, j, k) = (nb[0], nb[1], nb[2]);
                if linear.is_linear(i, center, j)?
                    || linear.is_linear(i, center, k)?
                    || linear.is_linear(j, center, k)?
                {
                    continue;
                }
                primitives.push(Primitive::OutOfPlane { center, i, j, k });
            }
        }

        let fragments = graph.fragments();
        if options.include_external {
            for fragment in &fragments {
                let atoms: Arc<[usize]> = Arc::from(fragment.as_slice());
                for axis in 0..3 {
                    primitives.push(Primitive::Translation {
                        atoms: atoms.clone(),
                        axis,
                    });
                }
                let rotator = Arc::new(Rotator::new(fragment.clone(), xyz));
                for axis in 0..3 {
                    primitives.push(Primitive::Rotation {
                        rotator: rotator.clone(),
                        axis,
                    });
                }
            }
        }

        let set = Self {
            primitives,
            elements: elements.to_vec(),
            fragments,
        };
        debug!(
            primitives = set.len(),
            fragments = set.fragments.len(),
            "Built primitive internal coordinates"
        );
        Ok(set)
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn natoms(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Connected components of the bond graph the set was built from.
    pub fn fragments(&self) -> &[Vec<usize>] {
        &self.fragments
    }

    pub fn count(&self, kind: PrimitiveKind) -> usize {
        self.primitives.iter().filter(|p| p.kind() == kind).count()
    }

    /// Number of primitives per kind, in [`PrimitiveKind::ALL`] order, omitting empty kinds.
    pub fn kind_counts(&self) -> Vec<(PrimitiveKind, usize)> {
        PrimitiveKind::ALL
            .iter()
            .map(|&k| (k, self.count(k)))
            .filter(|&(_, n)| n > 0)
            .collect()
    }

    fn check(&self, xyz: &[Point3<f64>]) -> Result<(), CoordinateError> {
        check_positions(self.natoms(), xyz)
    }

    pub fn calc(&self, xyz: &[Point3<f64>]) -> Result<DVector<f64>, CoordinateError> {
        self.check(xyz)?;
        let values = self
            .primitives
            .iter()
            .map(|p| p.value(xyz))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DVector::from_vec(values))
    }

    /// `calc(lhs) - calc(rhs)` with torsion-like differences wrapped into `(-pi, pi]`.
    pub fn calc_diff(
        &self,
        lhs: &[Point3<f64>],
        rhs: &[Point3<f64>],
    ) -> Result<DVector<f64>, CoordinateError> {
        self.check(lhs)?;
        self.check(rhs)?;
        let diffs = self
            .primitives
            .iter()
            .map(|p| {
                let d = p.value(lhs)? - p.value(rhs)?;
                Ok(if p.is_periodic() {
                    geometry::wrap_angle(d)
                } else {
                    d
                })
            })
            .collect::<Result<Vec<_>, DegeneracyError>>()?;
        Ok(DVector::from_vec(diffs))
    }

    pub fn gradient_rows(&self, xyz: &[Point3<f64>]) -> Result<Vec<GradientRow>, CoordinateError> {
        self.check(xyz)?;
        Ok(self
            .primitives
            .iter()
            .map(|p| p.gradient(xyz))
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Wilson B-matrix, `n_primitives x 3 * n_atoms`.
    pub fn bmat(&self, xyz: &[Point3<f64>]) -> Result<DMatrix<f64>, CoordinateError> {
        Ok(linalg::assemble_bmat(&self.gradient_rows(xyz)?, self.natoms()))
    }

    pub fn transpose_of_bmat(&self, xyz: &[Point3<f64>]) -> Result<DMatrix<f64>, CoordinateError> {
        Ok(self.bmat(xyz)?.transpose())
    }

    /// `G = B B^T`.
    pub fn gmat(&self, xyz: &[Point3<f64>]) -> Result<DMatrix<f64>, CoordinateError> {
        let b = self.bmat(xyz)?;
        Ok(&b * b.transpose())
    }

    pub fn pseudo_inverse_of_gmat(
        &self,
        xyz: &[Point3<f64>],
        tolerance: f64,
    ) -> Result<DMatrix<f64>, CoordinateError> {
        Ok(linalg::pseudo_inverse_gram(&self.bmat(xyz)?, tolerance))
    }

    /// `P = G G^+`, the projector onto the non-redundant subspace of the primitives.
    pub fn projector_matrix(
        &self,
        xyz: &[Point3<f64>],
        tolerance: f64,
    ) -> Result<DMatrix<f64>, CoordinateError> {
        let b = self.bmat(xyz)?;
        let g_inv = linalg::pseudo_inverse_gram(&b, tolerance);
        Ok(&b * b.transpose() * g_inv)
    }

    /// Diagonal of the empirical guess Hessian in the primitive basis.
    pub fn guess_hessian(&self, xyz: &[Point3<f64>]) -> Result<DVector<f64>, CoordinateError> {
        self.check(xyz)?;
        Ok(DVector::from_iterator(
            self.len(),
            self.primitives
                .iter()
                .map(|p| hessian::force_constant(p, &self.elements, xyz)),
        ))
    }
}

fn check_positions(natoms: usize, xyz: &[Point3<f64>]) -> Result<(), CoordinateError> {
    if xyz.len() != natoms {
        return Err(ConstructionError::LengthMismatch {
            elements: natoms,
            positions: xyz.len(),
        }
        .into());
    }
    Ok(())
}

struct LinearityTest<'a> {
    xyz: &'a [Point3<f64>],
    threshold: f64,
}

impl LinearityTest<'_> {
    fn is_linear(&self, a: usize, b: usize, c: usize) -> Result<bool, DegeneracyError> {
        let theta = geometry::angle(&self.xyz[a], &self.xyz[b], &self.xyz[c])
            .ok_or_else(|| DegeneracyError::new("angle", &[a, b, c], "zero-length bond"))?;
        Ok(theta > self.threshold || theta < PI - self.threshold)
    }
}

/// Adds torsions. Each bond is extended through chains of linear angles into an atom line,
/// and torsions are defined between the outer neighbours of the line ends.
fn add_dihedrals(
    graph: &BondGraph,
    linear: &LinearityTest<'_>,
    primitives: &mut Vec<Primitive>,
) -> Result<(), DegeneracyError> {
    let mut seen = HashSet::new();
    for &(b, c) in graph.edges() {
        let line = atom_line(graph, linear, b, c)?;
        let start = line[0];
        let second = line[1];
        let end = line[line.len() - 1];
        let penultimate = line[line.len() - 2];
        if !seen.insert((start.min(end), start.max(end))) {
            continue;
        }

        for &a in graph.neighbors(start) {
            if line.contains(&a) || linear.is_linear(a, start, second)? {
                continue;
            }
            for &d in graph.neighbors(end) {
                if d == a || line.contains(&d) || linear.is_linear(penultimate, end, d)? {
                    continue;
                }
                primitives.push(Primitive::Dihedral {
                    a,
                    b: start,
                    c: end,
                    d,
                });
            }
        }
    }
    Ok(())
}

fn atom_line(
    graph: &BondGraph,
    linear: &LinearityTest<'_>,
    b: usize,
    c: usize,
) -> Result<Vec<usize>, DegeneracyError> {
    let mut line = vec![b, c];
    'forward: loop {
        let last = line[line.len() - 1];
        let prev = line[line.len() - 2];
        for &n in graph.neighbors(last) {
            if !line.contains(&n) && linear.is_linear(prev, last, n)? {
                line.push(n);
                continue 'forward;
            }
        }
        break;
    }
    'backward: loop {
        let first = line[0];
        let next = line[1];
        for &n in graph.neighbors(first) {
            if !line.contains(&n) && linear.is_linear(n, first, next)? {
                line.insert(0, n);
                continue 'backward;
            }
        }
        break;
    }
    Ok(line)
}
