use crate::core::models::atom::Molecule;
use crate::core::models::topology::BondGraph;
use crate::core::primitives::PrimitiveKind;
use crate::engine::config::IcConfig;
use crate::engine::error::IcError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tric::Tric;
use tracing::{info, instrument};

/// One primitive coordinate evaluated at the input geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSummary {
    pub kind: PrimitiveKind,
    /// Human-readable label such as `Dihedral(0, 1, 2, 3)`.
    pub label: String,
    /// Bohr for distances and translations, radians otherwise.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub atoms: usize,
    pub bonds: usize,
    pub fragments: usize,
    /// Non-zero primitive counts in [`PrimitiveKind::ALL`] order.
    pub kind_counts: Vec<(PrimitiveKind, usize)>,
    pub primitive_count: usize,
    pub dimension: usize,
    pub expected_dimension: usize,
    /// Smallest and largest diagonal element of the delocalized guess Hessian.
    pub hessian_diagonal_range: Option<(f64, f64)>,
    pub primitives: Vec<PrimitiveSummary>,
    pub bond_graph: BondGraph,
}

impl AnalysisReport {
    /// Whether the delocalized basis spans all expected degrees of freedom.
    pub fn is_complete(&self) -> bool {
        self.dimension == self.expected_dimension
    }
}

/// Builds the coordinate system of `molecule` and summarizes it.
#[instrument(skip_all, name = "analysis_workflow")]
pub fn run(
    molecule: &Molecule,
    config: &IcConfig,
    reporter: &ProgressReporter,
) -> Result<AnalysisReport, IcError> {
    reporter.report(Progress::PhaseStart {
        name: "Building coordinates",
    });
    let tric = Tric::from_molecule(molecule, config.clone())?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Evaluating primitives",
    });
    let xyz = molecule.positions_bohr();
    let (Some(graph), Some(primitives), Some(basis)) =
        (tric.graph(), tric.primitives(), tric.basis())
    else {
        return Err(IcError::InvalidState {
            operation: "analyze",
            state: tric.state(),
        });
    };

    let values = primitives.calc(&xyz)?;
    let summaries = primitives
        .primitives()
        .iter()
        .zip(values.iter())
        .map(|(p, &value)| PrimitiveSummary {
            kind: p.kind(),
            label: p.to_string(),
            value,
        })
        .collect();

    let hessian = tric.guess_hessian(&xyz)?;
    let diagonal = hessian.diagonal();
    let hessian_diagonal_range = (!diagonal.is_empty()).then(|| (diagonal.min(), diagonal.max()));
    reporter.report(Progress::PhaseFinish);

    let report = AnalysisReport {
        atoms: molecule.len(),
        bonds: graph.edges().len(),
        fragments: primitives.fragments().len(),
        kind_counts: primitives.kind_counts(),
        primitive_count: primitives.len(),
        dimension: basis.dimension(),
        expected_dimension: basis.expected_dimension(),
        hessian_diagonal_range,
        primitives: summaries,
        bond_graph: graph.clone(),
    };
    info!(
        atoms = report.atoms,
        primitives = report.primitive_count,
        dimension = report.dimension,
        expected = report.expected_dimension,
        "Analysis finished"
    );
    Ok(report)
}
