//! # Primitive Internal Coordinates
//!
//! Typed primitive coordinates with exact analytic Cartesian derivatives.
//!
//! ## Overview
//!
//! Every primitive maps a full set of atomic positions (Bohr) to a scalar and provides
//! the sparse row of the Wilson B-matrix for that scalar: one 3-vector per atom it depends on.
//!
//! ## Architecture
//!
//! - [`Primitive`] - Closed sum type over all supported coordinate kinds
//! - [`Rotator`] - Reference geometry shared by the three rotation coordinates of a fragment
//! - [`builder`] - Construction of the full redundant set from a bond graph
//! - [`hessian`] - Empirical diagonal force constants

pub mod builder;
pub mod hessian;

use crate::core::error::DegeneracyError;
use crate::core::utils::geometry;
use crate::core::utils::quaternion;
use nalgebra::{Point3, Vector3};
use std::fmt;
use std::sync::Arc;

/// Sparse B-matrix row: `(atom index, d value / d position)` pairs.
pub type GradientRow = Vec<(usize, Vector3<f64>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Distance,
    Angle,
    LinearBend,
    OutOfPlane,
    Dihedral,
    Translation,
    Rotation,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 7] = [
        Self::Distance,
        Self::Angle,
        Self::LinearBend,
        Self::OutOfPlane,
        Self::Dihedral,
        Self::Translation,
        Self::Rotation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Angle => "angle",
            Self::LinearBend => "linear bend",
            Self::OutOfPlane => "out-of-plane",
            Self::Dihedral => "dihedral",
            Self::Translation => "translation",
            Self::Rotation => "rotation",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference orientation of one fragment.
///
/// The three rotation coordinates of a fragment share a single `Rotator` through an `Arc`,
/// so the reference geometry is stored once.
#[derive(Debug, Clone, PartialEq)]
pub struct Rotator {
    atoms: Vec<usize>,
    reference: Vec<Point3<f64>>,
    radius_of_gyration: f64,
}

impl Rotator {
    /// Captures the current positions of `atoms` as the reference orientation.
    pub fn new(atoms: Vec<usize>, xyz: &[Point3<f64>]) -> Self {
        let reference: Vec<_> = atoms.iter().map(|&i| xyz[i]).collect();
        let radius_of_gyration = geometry::radius_of_gyration(&reference);
        Self {
            atoms,
            reference,
            radius_of_gyration,
        }
    }

    pub fn atoms(&self) -> &[usize] {
        &self.atoms
    }

    pub fn radius_of_gyration(&self) -> f64 {
        self.radius_of_gyration
    }

    fn is_point_like(&self) -> bool {
        self.atoms.len() < 2 || self.radius_of_gyration == 0.0
    }

    fn current(&self, xyz: &[Point3<f64>]) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|&i| xyz[i]).collect()
    }

    /// Scaled rotation vector `rg * v` of the current fragment relative to the reference.
    pub fn value(&self, xyz: &[Point3<f64>]) -> Vector3<f64> {
        if self.is_point_like() {
            return Vector3::zeros();
        }
        quaternion::rotation_vector_between(&self.current(xyz), &self.reference)
            * self.radius_of_gyration
    }

    pub fn gradient(&self, xyz: &[Point3<f64>], axis: usize) -> GradientRow {
        if self.is_point_like() {
            return Vec::new();
        }
        let (_, jacobians) =
            quaternion::rotation_vector_with_gradient(&self.current(xyz), &self.reference);
        self.atoms
            .iter()
            .zip(jacobians)
            .map(|(&atom, jac)| {
                (
                    atom,
                    jac.row(axis).transpose() * self.radius_of_gyration,
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Distance {
        a: usize,
        b: usize,
    },
    Angle {
        a: usize,
        b: usize,
        c: usize,
    },
    /// One of the two components of a near-linear angle `a-b-c`. `aux` is the Cartesian
    /// axis fixed when the coordinate was created.
    LinearBend {
        a: usize,
        b: usize,
        c: usize,
        axis: usize,
        aux: Vector3<f64>,
    },
    OutOfPlane {
        center: usize,
        i: usize,
        j: usize,
        k: usize,
    },
    Dihedral {
        a: usize,
        b: usize,
        c: usize,
        d: usize,
    },
    Translation {
        atoms: Arc<[usize]>,
        axis: usize,
    },
    Rotation {
        rotator: Arc<Rotator>,
        axis: usize,
    },
}

const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];
const ROTATION_AXIS_NAMES: [&str; 3] = ["a", "b", "c"];

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Distance { .. } => PrimitiveKind::Distance,
            Self::Angle { .. } => PrimitiveKind::Angle,
            Self::LinearBend { .. } => PrimitiveKind::LinearBend,
            Self::OutOfPlane { .. } => PrimitiveKind::OutOfPlane,
            Self::Dihedral { .. } => PrimitiveKind::Dihedral,
            Self::Translation { .. } => PrimitiveKind::Translation,
            Self::Rotation { .. } => PrimitiveKind::Rotation,
        }
    }

    pub fn atoms(&self) -> Vec<usize> {
        match self {
            Self::Distance { a, b } => vec![*a, *b],
            Self::Angle { a, b, c } | Self::LinearBend { a, b, c, .. } => vec![*a, *b, *c],
            Self::OutOfPlane { center, i, j, k } => vec![*center, *i, *j, *k],
            Self::Dihedral { a, b, c, d } => vec![*a, *b, *c, *d],
            Self::Translation { atoms, .. } => atoms.to_vec(),
            Self::Rotation { rotator, .. } => rotator.atoms().to_vec(),
        }
    }

    /// Whether differences of this coordinate live on a circle and must be wrapped.
    pub fn is_periodic(&self) -> bool {
        matches!(self, Self::Dihedral { .. } | Self::OutOfPlane { .. })
    }

    fn degenerate(&self, reason: &str) -> DegeneracyError {
        DegeneracyError::new(self.kind().name(), &self.atoms(), reason)
    }

    /// Current value in Bohr or radians.
    ///
    /// # Panics
    ///
    /// Panics if an atom index of the primitive is out of range for `xyz`.
    pub fn value(&self, xyz: &[Point3<f64>]) -> Result<f64, DegeneracyError> {
        match self {
            Self::Distance { a, b } => Ok(geometry::distance(&xyz[*a], &xyz[*b])),
            Self::Angle { a, b, c } => geometry::angle(&xyz[*a], &xyz[*b], &xyz[*c])
                .ok_or_else(|| self.degenerate("zero-length bond")),
            Self::LinearBend { a, b, c, axis, aux } => {
                geometry::linear_bend(&xyz[*a], &xyz[*b], &xyz[*c], aux, *axis)
                    .ok_or_else(|| self.degenerate("bend axis parallel to auxiliary axis"))
            }
            Self::OutOfPlane { center, i, j, k } => {
                geometry::dihedral(&xyz[*center], &xyz[*i], &xyz[*j], &xyz[*k])
                    .ok_or_else(|| self.degenerate("collinear atoms"))
            }
            Self::Dihedral { a, b, c, d } => {
                geometry::dihedral(&xyz[*a], &xyz[*b], &xyz[*c], &xyz[*d])
                    .ok_or_else(|| self.degenerate("collinear atoms"))
            }
            Self::Translation { atoms, axis } => {
                let sum: f64 = atoms.iter().map(|&i| xyz[i][*axis]).sum();
                Ok(sum / atoms.len() as f64)
            }
            Self::Rotation { rotator, axis } => Ok(rotator.value(xyz)[*axis]),
        }
    }

    /// Sparse B-matrix row.
    ///
    /// # Panics
    ///
    /// Panics if an atom index of the primitive is out of range for `xyz`.
    pub fn gradient(&self, xyz: &[Point3<f64>]) -> Result<GradientRow, DegeneracyError> {
        match self {
            Self::Distance { a, b } => geometry::distance_gradient(&xyz[*a], &xyz[*b])
                .map(|[ga, gb]| vec![(*a, ga), (*b, gb)])
                .ok_or_else(|| self.degenerate("zero-length bond")),
            Self::Angle { a, b, c } => geometry::angle_gradient(&xyz[*a], &xyz[*b], &xyz[*c])
                .map(|[ga, gb, gc]| vec![(*a, ga), (*b, gb), (*c, gc)])
                .ok_or_else(|| self.degenerate("zero-length bond")),
            Self::LinearBend { a, b, c, axis, aux } => {
                geometry::linear_bend_gradient(&xyz[*a], &xyz[*b], &xyz[*c], aux, *axis)
                    .map(|[ga, gb, gc]| vec![(*a, ga), (*b, gb), (*c, gc)])
                    .ok_or_else(|| self.degenerate("bend axis parallel to auxiliary axis"))
            }
            Self::OutOfPlane { center, i, j, k } => {
                geometry::dihedral_gradient(&xyz[*center], &xyz[*i], &xyz[*j], &xyz[*k])
                    .map(|[g0, g1, g2, g3]| vec![(*center, g0), (*i, g1), (*j, g2), (*k, g3)])
                    .ok_or_else(|| self.degenerate("collinear atoms"))
            }
            Self::Dihedral { a, b, c, d } => {
                geometry::dihedral_gradient(&xyz[*a], &xyz[*b], &xyz[*c], &xyz[*d])
                    .map(|[ga, gb, gc, gd]| vec![(*a, ga), (*b, gb), (*c, gc), (*d, gd)])
                    .ok_or_else(|| self.degenerate("collinear atoms"))
            }
            Self::Translation { atoms, axis } => {
                let mut g = Vector3::zeros();
                g[*axis] = 1.0 / atoms.len() as f64;
                Ok(atoms.iter().map(|&i| (i, g)).collect())
            }
            Self::Rotation { rotator, axis } => Ok(rotator.gradient(xyz, *axis)),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Distance { a, b } => write!(f, "Distance({a}, {b})"),
            Self::Angle { a, b, c } => write!(f, "Angle({a}, {b}, {c})"),
            Self::LinearBend { a, b, c, axis, .. } => {
                write!(f, "LinearBend({a}, {b}, {c}; axis {axis})")
            }
            Self::OutOfPlane { center, i, j, k } => {
                write!(f, "OutOfPlane({center}; {i}, {j}, {k})")
            }
            Self::Dihedral { a, b, c, d } => write!(f, "Dihedral({a}, {b}, {c}, {d})"),
            Self::Translation { atoms, axis } => write!(
                f,
                "Translation-{}({} atoms from {})",
                AXIS_NAMES[*axis],
                atoms.len(),
                atoms.first().copied().unwrap_or_default()
            ),
            Self::Rotation { rotator, axis } => write!(
                f,
                "Rotation-{}({} atoms from {})",
                ROTATION_AXIS_NAMES[*axis],
                rotator.atoms().len(),
                rotator.atoms().first().copied().unwrap_or_default()
            ),
        }
    }
}
