use super::delocalize::DelocalizedBasis;
use super::error::IcError;
use crate::core::error::CoordinateError;
use crate::core::linalg;
use crate::core::primitives::builder::PrimitiveInternalCoordinates;
use nalgebra::{DVector, Point3};
use tracing::{debug, instrument, trace, warn};

/// Result of converting an internal-coordinate step into Cartesian coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum BackTransformOutcome {
    Converged {
        /// New geometry in Bohr.
        cartesian: Vec<Point3<f64>>,
        iterations: usize,
        /// Norm of the remaining internal-coordinate mismatch.
        residual: f64,
    },
    Failed {
        iterations: usize,
        residual: f64,
    },
}

impl BackTransformOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    pub fn iterations(&self) -> usize {
        match self {
            Self::Converged { iterations, .. } | Self::Failed { iterations, .. } => *iterations,
        }
    }

    /// Converts a failed outcome into [`IcError::Convergence`].
    pub fn into_result(self) -> Result<Vec<Point3<f64>>, IcError> {
        match self {
            Self::Converged { cartesian, .. } => Ok(cartesian),
            Self::Failed {
                iterations,
                residual,
            } => Err(IcError::Convergence {
                iterations,
                residual,
            }),
        }
    }
}

/// Iteration controls for [`newton_back_transform`].
#[derive(Debug, Clone, Copy)]
pub struct NewtonSettings {
    pub max_iterations: usize,
    pub convergence_tolerance: f64,
    pub pseudo_inverse_tolerance: f64,
}

/// Largest internal-coordinate mismatch accepted once the Cartesian step has vanished.
pub const RESIDUAL_TOLERANCE: f64 = 1e-8;

/// Newton iteration `x <- x + B^T G^+ r` with `r = dq - (q(x) - q(x0))` in the delocalized
/// basis, until the Cartesian step norm drops below the tolerance.
///
/// A vanishing step with a residual above [`RESIDUAL_TOLERANCE`] means the requested
/// displacement lies outside the range of `B` at the current geometry; that is a failure.
#[instrument(skip_all, name = "back_transform")]
pub fn newton_back_transform(
    primitives: &PrimitiveInternalCoordinates,
    basis: &DelocalizedBasis,
    x0: &[Point3<f64>],
    dq: &DVector<f64>,
    settings: &NewtonSettings,
) -> Result<BackTransformOutcome, CoordinateError> {
    let u = basis.del_mat();
    let mut x = linalg::flatten(x0);
    let mut geometry = x0.to_vec();
    let mut residual_vec = dq.clone();
    let mut residual = residual_vec.norm();

    for iteration in 1..=settings.max_iterations {
        let b = u.transpose() * primitives.bmat(&geometry)?;
        let g_inv = linalg::pseudo_inverse_gram(&b, settings.pseudo_inverse_tolerance);
        let dx = b.transpose() * (g_inv * &residual_vec);
        let step = dx.norm();

        if !step.is_finite() {
            warn!(iteration, "Non-finite Cartesian step in back-transformation");
            return Ok(BackTransformOutcome::Failed {
                iterations: iteration,
                residual,
            });
        }

        x += &dx;
        geometry = linalg::unflatten(&x);
        let achieved = u.transpose() * primitives.calc_diff(&geometry, x0)?;
        residual_vec = dq - achieved;
        residual = residual_vec.norm();
        trace!(iteration, step, residual, "Newton back-transformation step");

        if !residual.is_finite() {
            warn!(iteration, "Non-finite residual in back-transformation");
            return Ok(BackTransformOutcome::Failed {
                iterations: iteration,
                residual,
            });
        }
        if step < settings.convergence_tolerance {
            if residual > RESIDUAL_TOLERANCE {
                warn!(
                    iteration,
                    residual, "Back-transformation stalled before reaching the requested step"
                );
                return Ok(BackTransformOutcome::Failed {
                    iterations: iteration,
                    residual,
                });
            }
            debug!(iterations = iteration, residual, "Back-transformation converged");
            return Ok(BackTransformOutcome::Converged {
                cartesian: geometry,
                iterations: iteration,
                residual,
            });
        }
    }

    warn!(
        iterations = settings.max_iterations,
        residual, "Back-transformation did not converge"
    );
    Ok(BackTransformOutcome::Failed {
        iterations: settings.max_iterations,
        residual,
    })
}
