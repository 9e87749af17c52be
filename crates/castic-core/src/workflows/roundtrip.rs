use crate::core::models::atom::Molecule;
use crate::core::utils::units::bohr_to_angstrom;
use crate::engine::backtransform::BackTransformOutcome;
use crate::engine::config::{ConfigError, IcConfig};
use crate::engine::error::IcError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tric::Tric;
use nalgebra::{DVector, Point3};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_STEP: f64 = 0.01;

/// Result of displacing along one delocalized coordinate and undoing the displacement.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementCheck {
    pub coordinate: usize,
    /// `+step` or `-step`.
    pub step: f64,
    /// Largest atomic deviation (Å) from the starting geometry after the reverse step, or
    /// `None` when either back-transformation failed to converge.
    pub error: Option<f64>,
    /// Newton iterations of the forward and reverse back-transformations.
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundtripReport {
    pub dimension: usize,
    pub checks: Vec<DisplacementCheck>,
}

impl RoundtripReport {
    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| c.error.is_none()).count()
    }

    /// Largest Cartesian error (Å) over all converged checks.
    pub fn max_error(&self) -> f64 {
        self.checks
            .iter()
            .filter_map(|c| c.error)
            .fold(0.0, f64::max)
    }

    pub fn worst(&self) -> Option<&DisplacementCheck> {
        self.checks
            .iter()
            .filter(|c| c.error.is_some())
            .max_by(|a, b| a.error.partial_cmp(&b.error).unwrap_or(std::cmp::Ordering::Equal))
    }
}

/// Steps `+step` and `-step` along every delocalized coordinate, back-transforms, then
/// back-transforms the achieved internal displacement in reverse and compares against the
/// starting geometry. Non-converging back-transformations are recorded, not raised.
#[instrument(skip_all, name = "roundtrip_workflow")]
pub fn run(
    molecule: &Molecule,
    config: &IcConfig,
    step: f64,
    reporter: &ProgressReporter,
) -> Result<RoundtripReport, IcError> {
    if !(step.is_finite() && step > 0.0) {
        return Err(ConfigError::InvalidValue {
            parameter: "step",
            value: step,
            reason: "must be positive and finite",
        }
        .into());
    }

    reporter.report(Progress::PhaseStart {
        name: "Building coordinates",
    });
    let tric = Tric::from_molecule(molecule, config.clone())?;
    let x0 = molecule.positions_bohr();
    let dimension = tric.dimension();
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Round-trip displacements",
    });
    reporter.report(Progress::TaskStart {
        total_steps: 2 * dimension as u64,
    });
    let mut checks = Vec::with_capacity(2 * dimension);
    for coordinate in 0..dimension {
        for signed_step in [step, -step] {
            let check = displace_and_return(&tric, &x0, coordinate, signed_step)?;
            if check.error.is_none() {
                reporter.report(Progress::Message(format!(
                    "Coordinate {} ({:+}) did not converge",
                    coordinate, signed_step
                )));
            }
            checks.push(check);
            reporter.report(Progress::TaskIncrement);
        }
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let report = RoundtripReport { dimension, checks };
    if report.failures() > 0 {
        warn!(
            failures = report.failures(),
            "Some back-transformations did not converge"
        );
    }
    info!(
        dimension,
        max_error = report.max_error(),
        "Round-trip check finished"
    );
    Ok(report)
}

fn displace_and_return(
    tric: &Tric,
    x0: &[Point3<f64>],
    coordinate: usize,
    step: f64,
) -> Result<DisplacementCheck, IcError> {
    let mut dq = DVector::zeros(tric.dimension());
    dq[coordinate] = step;

    let failed = |iterations| DisplacementCheck {
        coordinate,
        step,
        error: None,
        iterations,
    };

    let (x1, forward) = match tric.back_transform(x0, &dq)? {
        BackTransformOutcome::Converged {
            cartesian,
            iterations,
            ..
        } => (cartesian, iterations),
        failed_outcome => return Ok(failed(failed_outcome.iterations())),
    };

    let achieved = tric.calc_diff(&x1, x0)?;
    let (x2, reverse) = match tric.back_transform(&x1, &-achieved)? {
        BackTransformOutcome::Converged {
            cartesian,
            iterations,
            ..
        } => (cartesian, iterations),
        failed_outcome => return Ok(failed(forward + failed_outcome.iterations())),
    };

    let error = x0
        .iter()
        .zip(&x2)
        .map(|(a, b)| bohr_to_angstrom((a - b).norm()))
        .fold(0.0, f64::max);
    debug!(coordinate, step, error, "Round trip complete");
    Ok(DisplacementCheck {
        coordinate,
        step,
        error: Some(error),
        iterations: forward + reverse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn hydrogen_peroxide() -> Molecule {
        let positions = [
            [0.8328, 0.8953, 0.4001],
            [0.7040, 0.0, 0.0],
            [-0.7040, 0.0, 0.0],
            [-0.8328, -0.2987, 0.9234],
        ]
        .map(|p| Point3::new(p[0], p[1], p[2]));
        Molecule::from_symbols(&["H", "O", "O", "H"], &positions).unwrap()
    }

    #[test]
    fn small_displacements_are_undone_exactly() {
        let report = run(
            &hydrogen_peroxide(),
            &IcConfig::default(),
            DEFAULT_STEP,
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(report.dimension, 12);
        assert_eq!(report.checks.len(), 24);
        assert_eq!(report.failures(), 0);
        assert!(report.max_error() < 1e-6, "max error {:e}", report.max_error());
        assert!(report.worst().is_some());
    }

    #[test]
    fn iteration_limit_is_reported_as_failures() {
        let config = IcConfig {
            newton_max_iterations: 1,
            ..IcConfig::default()
        };
        let report = run(&hydrogen_peroxide(), &config, 0.1, &ProgressReporter::new()).unwrap();
        assert_eq!(report.failures(), report.checks.len());
        assert_eq!(report.max_error(), 0.0);
        assert!(report.worst().is_none());
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let err = run(
            &hydrogen_peroxide(),
            &IcConfig::default(),
            0.0,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, IcError::Config { .. }));
    }

    #[test]
    fn every_displacement_increments_progress() {
        let increments = Mutex::new(0u64);
        let total = Mutex::new(0u64);
        let reporter = ProgressReporter::with_callback(Box::new(|event: Progress| match event {
            Progress::TaskStart { total_steps } => *total.lock().unwrap() = total_steps,
            Progress::TaskIncrement => *increments.lock().unwrap() += 1,
            _ => {}
        }));
        run(&hydrogen_peroxide(), &IcConfig::default(), DEFAULT_STEP, &reporter).unwrap();
        drop(reporter);
        assert_eq!(total.into_inner().unwrap(), 24);
        assert_eq!(increments.into_inner().unwrap(), 24);
    }
}
