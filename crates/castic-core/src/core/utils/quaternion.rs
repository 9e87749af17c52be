//! Quaternion superposition and its exponential-map rotation vector.
//!
//! The optimal rotation superimposing a centred structure `x` onto a centred reference `y`
//! is the top eigenvector `q` of the symmetric 4x4 matrix `F` built from the correlation
//! matrix `R = sum_i x_i y_i^T`. The rotation is reported as the vector `v = theta * n`, and
//! its Cartesian derivatives follow from first-order eigenvector perturbation theory.

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Point3, SymmetricEigen, Vector3, Vector4};

/// Relative gap under which two eigenvalues of `F` are treated as degenerate.
const DEGENERACY_TOLERANCE: f64 = 1e-8;
/// Distance of `q0` from one below which the exponential map uses its series expansion.
const SERIES_THRESHOLD: f64 = 1e-8;

pub fn correlation_matrix(x: &[Vector3<f64>], y: &[Vector3<f64>]) -> Matrix3<f64> {
    x.iter()
        .zip(y)
        .fold(Matrix3::zeros(), |acc, (xi, yi)| acc + xi * yi.transpose())
}

pub fn f_matrix(r: &Matrix3<f64>) -> Matrix4<f64> {
    let (r11, r12, r13) = (r[(0, 0)], r[(0, 1)], r[(0, 2)]);
    let (r21, r22, r23) = (r[(1, 0)], r[(1, 1)], r[(1, 2)]);
    let (r31, r32, r33) = (r[(2, 0)], r[(2, 1)], r[(2, 2)]);

    let f01 = r23 - r32;
    let f02 = r31 - r13;
    let f03 = r12 - r21;
    let f12 = r12 + r21;
    let f13 = r13 + r31;
    let f23 = r23 + r32;
    Matrix4::new(
        r11 + r22 + r33, f01, f02, f03,
        f01, r11 - r22 - r33, f12, f13,
        f02, f12, r22 - r33 - r11, f23,
        f03, f13, f23, r33 - r22 - r11,
    )
}

/// Eigen-decomposition of `F` reduced to what the rotation gradient needs.
pub struct Superposition {
    /// Unit quaternion with `q0 >= 0`.
    pub q: Vector4<f64>,
    /// Sum over the non-degenerate eigenpairs of `v v^T / (lambda_max - lambda)`.
    pub resolvent: Matrix4<f64>,
}

pub fn superpose(x: &[Vector3<f64>], y: &[Vector3<f64>]) -> Superposition {
    let f = f_matrix(&correlation_matrix(x, y));
    let eigen = SymmetricEigen::new(f);

    let top = eigen.eigenvalues.imax();
    let lambda_max = eigen.eigenvalues[top];
    let tol = DEGENERACY_TOLERANCE * lambda_max.abs().max(1.0);

    let mut degenerate = Vec::new();
    let mut resolvent = Matrix4::zeros();
    for i in 0..4 {
        let v = eigen.eigenvectors.column(i);
        let gap = lambda_max - eigen.eigenvalues[i];
        if gap.abs() <= tol {
            degenerate.push(i);
        } else {
            resolvent += v * v.transpose() / gap;
        }
    }

    let q = if degenerate.len() > 1 {
        // Pick the member of the degenerate subspace closest to the identity rotation.
        let identity = Vector4::new(1.0, 0.0, 0.0, 0.0);
        let projected = degenerate.iter().fold(Vector4::zeros(), |acc, &i| {
            let v = eigen.eigenvectors.column(i);
            acc + v * v.dot(&identity)
        });
        if projected.norm() > DEGENERACY_TOLERANCE {
            projected.normalize()
        } else {
            eigen.eigenvectors.column(top).into_owned()
        }
    } else {
        eigen.eigenvectors.column(top).into_owned()
    };
    let q = if q[0] < 0.0 { -q } else { q };

    Superposition { q, resolvent }
}

/// `2 acos(q0) / sqrt(1 - q0^2)` and its derivative with respect to `q0`.
fn exponential_map_factor(q0: f64) -> (f64, f64) {
    let q0 = q0.clamp(-1.0, 1.0);
    if (q0 - 1.0).abs() < SERIES_THRESHOLD {
        (2.0 - 2.0 * (q0 - 1.0) / 3.0, -2.0 / 3.0)
    } else {
        let s = (1.0 - q0 * q0).sqrt();
        let acos = q0.acos();
        let fac = 2.0 * acos / s;
        let dfac = -2.0 / (s * s) + 2.0 * q0 * acos / (s * s * s);
        (fac, dfac)
    }
}

pub fn rotation_vector(q: &Vector4<f64>) -> Vector3<f64> {
    let (fac, _) = exponential_map_factor(q[0]);
    Vector3::new(q[1], q[2], q[3]) * fac
}

/// Jacobian `dv/dq` of the exponential map.
pub fn rotation_vector_jacobian(q: &Vector4<f64>) -> Matrix3x4<f64> {
    let (fac, dfac) = exponential_map_factor(q[0]);
    let mut jac = Matrix3x4::zeros();
    for i in 0..3 {
        jac[(i, 0)] = dfac * q[i + 1];
        jac[(i, i + 1)] = fac;
    }
    jac
}

/// Rotation vector taking the current fragment `positions` onto `reference`, together with
/// `dv/dr` for every atom (3x3, row = component of `v`, column = Cartesian direction).
///
/// Both inputs must have the same length; centring is done here.
pub fn rotation_vector_with_gradient(
    positions: &[Point3<f64>],
    reference: &[Point3<f64>],
) -> (Vector3<f64>, Vec<Matrix3<f64>>) {
    let x = centred(positions);
    let y = centred(reference);
    let sup = superpose(&x, &y);
    let v = rotation_vector(&sup.q);
    let dv_dq = rotation_vector_jacobian(&sup.q);

    let grads = y
        .iter()
        .map(|yu| {
            let mut jac = Matrix3::zeros();
            for w in 0..3 {
                let mut dr = Matrix3::zeros();
                dr.set_row(w, &yu.transpose());
                let dq = sup.resolvent * f_matrix(&dr) * sup.q;
                jac.set_column(w, &(dv_dq * dq));
            }
            jac
        })
        .collect();
    (v, grads)
}

pub fn rotation_vector_between(positions: &[Point3<f64>], reference: &[Point3<f64>]) -> Vector3<f64> {
    let sup = superpose(&centred(positions), &centred(reference));
    rotation_vector(&sup.q)
}

fn centred(points: &[Point3<f64>]) -> Vec<Vector3<f64>> {
    if points.is_empty() {
        return Vec::new();
    }
    let mean = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / points.len() as f64;
    points.iter().map(|p| p.coords - mean).collect()
}
