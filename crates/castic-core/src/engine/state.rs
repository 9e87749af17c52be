use std::fmt;

/// Lifecycle of a [`Tric`](super::tric::Tric) instance.
///
/// `Uninitialized -> GraphBuilt -> PrimitivesBuilt -> Delocalized -> Ready`. A ready
/// instance becomes `Stale` when the geometry drifts far from the basis reference, and any
/// rebuild restarts at `GraphBuilt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TricState {
    #[default]
    Uninitialized,
    GraphBuilt,
    PrimitivesBuilt,
    Delocalized,
    Ready,
    Stale,
}

impl TricState {
    /// Whether coordinate transforms may run in this state.
    pub fn accepts_transforms(&self) -> bool {
        matches!(self, Self::Ready | Self::Stale)
    }
}

impl fmt::Display for TricState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "Uninitialized",
            Self::GraphBuilt => "GraphBuilt",
            Self::PrimitivesBuilt => "PrimitivesBuilt",
            Self::Delocalized => "Delocalized",
            Self::Ready => "Ready",
            Self::Stale => "Stale",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ready_and_stale_accept_transforms() {
        assert!(TricState::Ready.accepts_transforms());
        assert!(TricState::Stale.accepts_transforms());
        for state in [
            TricState::Uninitialized,
            TricState::GraphBuilt,
            TricState::PrimitivesBuilt,
            TricState::Delocalized,
        ] {
            assert!(!state.accepts_transforms(), "{state}");
        }
    }

    #[test]
    fn default_state_is_uninitialized() {
        assert_eq!(TricState::default(), TricState::Uninitialized);
    }
}
