use super::prepare;
use crate::cli::AnalyzeArgs;
use crate::error::Result;
use castic::core::models::atom::Molecule;
use castic::engine::progress::ProgressReporter;
use castic::workflows::analyze::{self, AnalysisReport};
use std::path::Path;
use tracing::{info, warn};

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let (molecule, config) = prepare(&args.coordinates)?;

    info!("Invoking the analysis workflow...");
    let report = analyze::run(&molecule, &config, &ProgressReporter::new())?;
    if !report.is_complete() {
        warn!(
            dimension = report.dimension,
            expected = report.expected_dimension,
            "Delocalized basis does not span all degrees of freedom"
        );
    }

    if let Some(path) = &args.dot {
        write_dot(&report, &molecule, path)?;
    }
    print!("{}", render(&report, args.primitives));
    Ok(())
}

fn write_dot(report: &AnalysisReport, molecule: &Molecule, path: &Path) -> Result<()> {
    info!("Writing bond graph to {:?}", path);
    std::fs::write(path, report.bond_graph.to_dot(&molecule.elements()))?;
    Ok(())
}

fn render(report: &AnalysisReport, list_primitives: bool) -> String {
    let mut lines = vec![
        format!("Atoms:       {}", report.atoms),
        format!("Bonds:       {}", report.bonds),
        format!("Fragments:   {}", report.fragments),
        format!("Primitives:  {}", report.primitive_count),
    ];
    lines.extend(
        report
            .kind_counts
            .iter()
            .map(|(kind, count)| format!("  {:<14}{}", kind.name(), count)),
    );
    lines.push(format!(
        "Delocalized: {} (expected {}){}",
        report.dimension,
        report.expected_dimension,
        if report.is_complete() { "" } else { "  [rank deficient]" }
    ));
    lines.push(match report.hessian_diagonal_range {
        Some((min, max)) => format!("Guess Hessian diagonal: {:.6} .. {:.6}", min, max),
        None => "Guess Hessian diagonal: empty".to_string(),
    });
    if list_primitives {
        lines.push(String::new());
        lines.extend(
            report
                .primitives
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{:>5}  {:<40}{:>14.8}", i, p.label, p.value)),
        );
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use castic::core::models::topology::BondGraph;
    use castic::core::primitives::PrimitiveKind;
    use castic::workflows::analyze::PrimitiveSummary;
    use nalgebra::Point3;

    fn report() -> AnalysisReport {
        AnalysisReport {
            atoms: 2,
            bonds: 1,
            fragments: 1,
            kind_counts: vec![(PrimitiveKind::Distance, 1)],
            primitive_count: 1,
            dimension: 1,
            expected_dimension: 1,
            hessian_diagonal_range: Some((0.5, 0.5)),
            primitives: vec![PrimitiveSummary {
                kind: PrimitiveKind::Distance,
                label: "Distance(0, 1)".to_string(),
                value: 1.4,
            }],
            bond_graph: BondGraph::from_edges(2, &[(0, 1)]).unwrap(),
        }
    }

    fn hydrogen() -> Molecule {
        let positions = [Point3::origin(), Point3::new(0.0, 0.0, 0.74)];
        Molecule::from_symbols(&["H", "H"], &positions).unwrap()
    }

    #[test]
    fn summary_lists_counts_and_dimension() {
        let text = render(&report(), false);
        assert!(text.contains("Atoms:       2"));
        assert!(text.contains("distance"));
        assert!(text.contains("Delocalized: 1 (expected 1)\n"));
        assert!(!text.contains("Distance(0, 1)"));
    }

    #[test]
    fn primitive_listing_is_optional() {
        let text = render(&report(), true);
        assert!(text.contains("Distance(0, 1)"));
        assert!(text.contains("1.40000000"));
    }

    #[test]
    fn rank_deficiency_is_flagged() {
        let mut r = report();
        r.dimension = 0;
        assert!(render(&r, false).contains("[rank deficient]"));
    }

    #[test]
    fn bond_graph_is_written_as_dot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h2.dot");
        write_dot(&report(), &hydrogen(), &path).unwrap();
        let dot = std::fs::read_to_string(&path).unwrap();
        assert!(dot.starts_with("graph molecule {"));
        assert!(dot.contains("1 [label=\"H1\"];"));
        assert!(dot.contains("0 -- 1;"));
    }

    #[test]
    fn dot_to_missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("h2.dot");
        let err = write_dot(&report(), &hydrogen(), &path).unwrap_err();
        assert!(matches!(err, crate::error::CliError::Io(_)));
    }
}
