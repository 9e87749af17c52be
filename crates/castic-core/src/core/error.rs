use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstructionError {
    #[error("Unknown element symbol '{symbol}' for atom {index}")]
    UnknownElement { index: usize, symbol: String },

    #[error("Atom index {index} is out of range for a system of {natoms} atoms")]
    AtomIndexOutOfRange { index: usize, natoms: usize },

    #[error("Cannot build an internal coordinate system from an empty atom set")]
    EmptyAtomSet,

    #[error("Got {elements} element symbols but {positions} positions")]
    LengthMismatch { elements: usize, positions: usize },
}

/// A geometric singularity that makes a primitive coordinate's derivative undefined.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Degenerate {kind} involving atoms {atoms:?}: {reason}")]
pub struct DegeneracyError {
    pub kind: &'static str,
    pub atoms: Vec<usize>,
    pub reason: String,
}

impl DegeneracyError {
    pub fn new(kind: &'static str, atoms: &[usize], reason: impl Into<String>) -> Self {
        Self {
            kind,
            atoms: atoms.to_vec(),
            reason: reason.into(),
        }
    }
}

/// Failure while evaluating or building a set of primitive coordinates.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordinateError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Degeneracy(#[from] DegeneracyError),

    #[error("Eigen-decomposition of the G matrix is inaccurate (residual {residual:.3e})")]
    InaccurateDecomposition { residual: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_element_message_names_symbol_and_index() {
        let err = ConstructionError::UnknownElement {
            index: 4,
            symbol: "Xx".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Xx"));
        assert!(msg.contains('4'));
    }

    #[test]
    fn degeneracy_message_lists_offending_atoms() {
        let err = DegeneracyError::new("dihedral", &[0, 1, 2, 3], "collinear atoms");
        assert_eq!(
            err.to_string(),
            "Degenerate dihedral involving atoms [0, 1, 2, 3]: collinear atoms"
        );
    }

    #[test]
    fn coordinate_error_is_transparent_over_sources() {
        let err: CoordinateError = ConstructionError::EmptyAtomSet.into();
        assert_eq!(err.to_string(), ConstructionError::EmptyAtomSet.to_string());
        let err: CoordinateError = DegeneracyError::new("angle", &[0, 1, 2], "zero-length bond").into();
        assert!(matches!(err, CoordinateError::Degeneracy(_)));
    }
}
