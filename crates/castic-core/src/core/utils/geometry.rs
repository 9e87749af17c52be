use nalgebra::{Matrix3, Point3, Vector3};
use std::f64::consts::PI;
use tracing::warn;

/// Norms below this are treated as zero-length bonds or vanishing cross products.
const DEGENERATE_NORM: f64 = 1e-10;

#[inline]
pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (b - a).norm()
}

/// Gradient of `|b - a|` with respect to `a` and `b`.
pub fn distance_gradient(a: &Point3<f64>, b: &Point3<f64>) -> Option<[Vector3<f64>; 2]> {
    let u = b - a;
    let r = u.norm();
    if r < DEGENERATE_NORM {
        return None;
    }
    let e = u / r;
    Some([-e, e])
}

/// Bond angle at `b` in radians, in `[0, pi]`.
pub fn angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<f64> {
    let u = a - b;
    let w = c - b;
    let (nu, nw) = (u.norm(), w.norm());
    if nu < DEGENERATE_NORM || nw < DEGENERATE_NORM {
        return None;
    }
    Some((u.dot(&w) / (nu * nw)).clamp(-1.0, 1.0).acos())
}

pub fn angle_gradient(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Option<[Vector3<f64>; 3]> {
    let u = a - b;
    let w = c - b;
    let (nu, nw) = (u.norm(), w.norm());
    if nu < DEGENERATE_NORM || nw < DEGENERATE_NORM {
        return None;
    }
    let eu = u / nu;
    let ew = w / nw;

    let mut normal = eu.cross(&ew);
    if normal.norm() < 1e-6 {
        warn!("Bending plane undefined for a (near) linear angle; using a fallback normal");
        normal = eu.cross(&Vector3::new(1.0, -1.0, 1.0));
        if normal.norm() < 1e-6 {
            normal = eu.cross(&Vector3::new(-1.0, 1.0, 1.0));
        }
    }
    let wp = normal.normalize();

    let ga = eu.cross(&wp) / nu;
    let gc = wp.cross(&ew) / nw;
    Some([ga, -(ga + gc), gc])
}

/// Signed torsion `a-b-c-d` (IUPAC convention) in `(-pi, pi]`.
pub fn dihedral(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
) -> Option<f64> {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;
    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    if n1.norm() < DEGENERATE_NORM || n2.norm() < DEGENERATE_NORM {
        return None;
    }
    let y = b2.norm() * b1.dot(&n2);
    let x = n1.dot(&n2);
    let phi = y.atan2(x);
    Some(if phi <= -PI { PI } else { phi })
}

/// Blondel-Karplus closed-form torsion gradient.
pub fn dihedral_gradient(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
) -> Option<[Vector3<f64>; 4]> {
    let f = a - b;
    let g = b - c;
    let h = d - c;
    let av = f.cross(&g);
    let bv = h.cross(&g);
    let a2 = av.norm_squared();
    let b2 = bv.norm_squared();
    let gn = g.norm();
    if a2.sqrt() < DEGENERATE_NORM || b2.sqrt() < DEGENERATE_NORM || gn < DEGENERATE_NORM {
        return None;
    }

    let fg = f.dot(&g) / (a2 * gn);
    let hg = h.dot(&g) / (b2 * gn);
    let ga = av * (-gn / a2);
    let gd = bv * (gn / b2);
    let gb = av * (gn / a2) + av * fg - bv * hg;
    let gc = bv * hg - av * fg - bv * (gn / b2);
    Some([ga, gb, gc, gd])
}

/// Cartesian unit axis least parallel to the direction `a -> c`. Ties go to the first axis.
pub fn least_parallel_axis(a: &Point3<f64>, c: &Point3<f64>) -> Vector3<f64> {
    let v = c - a;
    let n = v.norm();
    let v = if n > 0.0 { v / n } else { v };
    let mut best = 0;
    for i in 1..3 {
        if v[i].abs() < v[best].abs() {
            best = i;
        }
    }
    let mut axis = Vector3::zeros();
    axis[best] = 1.0;
    axis
}

/// Derivative of `x / |x|` with respect to `x`.
fn normalization_jacobian(x: &Vector3<f64>) -> Matrix3<f64> {
    let n = x.norm();
    let e = x / n;
    (Matrix3::identity() - e * e.transpose()) / n
}

struct LinearBendFrame {
    eu: Vector3<f64>,
    ew: Vector3<f64>,
    nu: Matrix3<f64>,
    nw: Matrix3<f64>,
    nv: Matrix3<f64>,
    c0: Vector3<f64>,
    c1: Vector3<f64>,
    j0: Matrix3<f64>,
    j1: Matrix3<f64>,
}

fn linear_bend_frame(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    aux: &Vector3<f64>,
) -> Option<LinearBendFrame> {
    let u = a - b;
    let w = c - b;
    let v = c - a;
    if u.norm() < DEGENERATE_NORM || w.norm() < DEGENERATE_NORM || v.norm() < DEGENERATE_NORM {
        return None;
    }
    let ev = v.normalize();
    let c0_raw = ev.cross(aux);
    if c0_raw.norm() < DEGENERATE_NORM {
        return None;
    }
    let c0 = c0_raw.normalize();
    let c1_raw = ev.cross(&c0);
    let c1 = c1_raw.normalize();

    let j0 = normalization_jacobian(&c0_raw) * (-aux.cross_matrix());
    let j1 = normalization_jacobian(&c1_raw) * (-c0.cross_matrix() + ev.cross_matrix() * j0);

    Some(LinearBendFrame {
        eu: u.normalize(),
        ew: w.normalize(),
        nu: normalization_jacobian(&u),
        nw: normalization_jacobian(&w),
        nv: normalization_jacobian(&v),
        c0,
        c1,
        j0,
        j1,
    })
}

/// Component of the summed bond unit vectors `e_ba + e_bc` along one of the two directions
/// perpendicular to `a -> c`, built from the auxiliary axis `aux`. `axis` selects the
/// direction (0 or 1). Zero for a perfectly linear arrangement.
pub fn linear_bend(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    aux: &Vector3<f64>,
    axis: usize,
) -> Option<f64> {
    let frame = linear_bend_frame(a, b, c, aux)?;
    let ck = if axis == 0 { frame.c0 } else { frame.c1 };
    Some((frame.eu + frame.ew).dot(&ck))
}

pub fn linear_bend_gradient(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    aux: &Vector3<f64>,
    axis: usize,
) -> Option<[Vector3<f64>; 3]> {
    let frame = linear_bend_frame(a, b, c, aux)?;
    let (ck, jk) = if axis == 0 {
        (frame.c0, frame.j0)
    } else {
        (frame.c1, frame.j1)
    };
    let s = frame.eu + frame.ew;
    let g_ev = jk.transpose() * s;
    let from_v = frame.nv * g_ev;

    let ga = frame.nu * ck - from_v;
    let gb = -(frame.nu * ck) - frame.nw * ck;
    let gc = frame.nw * ck + from_v;
    Some([ga, gb, gc])
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

/// Root-mean-square distance of the points from their centroid. Zero for fewer than two points.
pub fn radius_of_gyration(points: &[Point3<f64>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let Some(center) = centroid(points) else {
        return 0.0;
    };
    let sum: f64 = points.iter().map(|p| (p - center).norm_squared()).sum();
    (sum / points.len() as f64).sqrt()
}

/// Wraps an angle difference into `(-pi, pi]`.
pub fn wrap_angle(x: f64) -> f64 {
    let mut y = x % (2.0 * PI);
    if y > PI {
        y -= 2.0 * PI;
    } else if y <= -PI {
        y += 2.0 * PI;
    }
    y
}
