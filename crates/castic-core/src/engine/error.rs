use super::config::ConfigError;
use super::state::TricState;
use crate::core::error::{ConstructionError, CoordinateError, DegeneracyError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IcError {
    #[error("Failed to construct coordinate system: {source}")]
    Construction {
        #[from]
        source: ConstructionError,
    },

    #[error("Geometry is singular: {source}")]
    Degeneracy {
        #[from]
        source: DegeneracyError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error(
        "Back-transformation failed to converge after {iterations} iterations (residual {residual:.3e})"
    )]
    Convergence { iterations: usize, residual: f64 },

    #[error("Eigen-decomposition of the G matrix is inaccurate (residual {residual:.3e})")]
    Decomposition { residual: f64 },

    #[error("Operation '{operation}' is not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: TricState,
    },

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

impl IcError {
    /// Whether the caller can sensibly retry, e.g. with a shorter step.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Convergence { .. })
    }
}

impl From<CoordinateError> for IcError {
    fn from(err: CoordinateError) -> Self {
        match err {
            CoordinateError::Construction(source) => Self::Construction { source },
            CoordinateError::Degeneracy(source) => Self::Degeneracy { source },
            CoordinateError::InaccurateDecomposition { residual } => {
                Self::Decomposition { residual }
            }
        }
    }
}
