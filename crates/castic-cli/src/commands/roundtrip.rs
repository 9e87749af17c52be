use super::prepare;
use crate::cli::RoundtripArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use castic::engine::progress::ProgressReporter;
use castic::workflows::roundtrip::{self, RoundtripReport};
use tracing::info;

pub fn run(args: RoundtripArgs, quiet: bool) -> Result<()> {
    let (molecule, config) = prepare(&args.coordinates)?;

    let progress_handler = if quiet {
        CliProgressHandler::hidden()
    } else {
        CliProgressHandler::new()
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!(step = args.step, "Invoking the round-trip workflow...");
    let report = roundtrip::run(&molecule, &config, args.step, &reporter)?;

    print!("{}", render(&report, args.step));
    Ok(())
}

fn render(report: &RoundtripReport, step: f64) -> String {
    let mut lines = vec![
        format!("Delocalized coordinates: {}", report.dimension),
        format!("Displacements:           {} (step {})", report.checks.len(), step),
        format!("Failed to converge:      {}", report.failures()),
        format!("Max Cartesian error:     {:.3e} Å", report.max_error()),
    ];
    if let Some(worst) = report.worst() {
        lines.push(format!(
            "Worst coordinate:        {} ({:+}), {} iterations",
            worst.coordinate, worst.step, worst.iterations
        ));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use castic::workflows::roundtrip::DisplacementCheck;

    #[test]
    fn summary_reports_failures_and_worst_coordinate() {
        let report = RoundtripReport {
            dimension: 1,
            checks: vec![
                DisplacementCheck {
                    coordinate: 0,
                    step: 0.01,
                    error: Some(2e-9),
                    iterations: 8,
                },
                DisplacementCheck {
                    coordinate: 0,
                    step: -0.01,
                    error: None,
                    iterations: 50,
                },
            ],
        };
        let text = render(&report, 0.01);
        assert!(text.contains("Failed to converge:      1"));
        assert!(text.contains("2.000e-9"));
        assert!(text.contains("Worst coordinate:        0 (+0.01), 8 iterations"));
    }
}
