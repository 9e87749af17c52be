//! Empirical diagonal force constants (Schlegel rules) for the initial Hessian guess.
//!
//! Bond stretches use `A / (r - B)^3` with `r` in Bohr and `B` chosen by the periods of the
//! two atoms. Every other kind of coordinate gets a constant.

use super::Primitive;
use crate::core::models::element::{Element, Period};
use crate::core::utils::geometry;
use nalgebra::Point3;

pub const STRETCH_NUMERATOR: f64 = 1.734;
pub const BEND_WITH_HYDROGEN: f64 = 0.160;
pub const BEND_HEAVY: f64 = 0.250;
pub const TORSION: f64 = 0.0023;
pub const OUT_OF_PLANE: f64 = 0.045;
pub const EXTERNAL: f64 = 0.05;

/// Smallest allowed `r - B` so compressed or very heavy bonds keep a finite constant.
const MIN_STRETCH_DENOMINATOR: f64 = 0.1;

fn stretch_offset(p1: Period, p2: Period) -> f64 {
    let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
    match (lo, hi) {
        (Period::One, Period::One) => -0.244,
        (Period::One, Period::Two) => 0.352,
        (Period::Two, Period::Two) => 1.085,
        (Period::One, Period::Three) => 0.660,
        (Period::Two, Period::Three) => 1.522,
        _ => 2.068,
    }
}

pub fn stretch_force_constant(e1: Element, e2: Element, r_bohr: f64) -> f64 {
    let denominator = (r_bohr - stretch_offset(e1.period(), e2.period())).max(MIN_STRETCH_DENOMINATOR);
    STRETCH_NUMERATOR / denominator.powi(3)
}

fn bend_force_constant(elements: &[Element], a: usize, c: usize) -> f64 {
    if elements[a].is_hydrogen() || elements[c].is_hydrogen() {
        BEND_WITH_HYDROGEN
    } else {
        BEND_HEAVY
    }
}

/// Diagonal guess-Hessian entry for one primitive.
pub fn force_constant(primitive: &Primitive, elements: &[Element], xyz: &[Point3<f64>]) -> f64 {
    match primitive {
        Primitive::Distance { a, b } => {
            stretch_force_constant(elements[*a], elements[*b], geometry::distance(&xyz[*a], &xyz[*b]))
        }
        Primitive::Angle { a, c, .. } | Primitive::LinearBend { a, c, .. } => {
            bend_force_constant(elements, *a, *c)
        }
        Primitive::Dihedral { .. } => TORSION,
        Primitive::OutOfPlane { .. } => OUT_OF_PLANE,
        Primitive::Translation { .. } | Primitive::Rotation { .. } => EXTERNAL,
    }
}
