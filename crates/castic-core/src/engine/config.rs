use crate::core::primitives::builder::{DEFAULT_LINEAR_ANGLE_THRESHOLD, PrimitiveOptions};
use crate::core::models::topology::DEFAULT_BOND_SCALE_FACTOR;
use std::f64::consts::{FRAC_PI_2, PI};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value {value} for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Numerical settings of a coordinate system. All lengths are in Bohr, angles in radians.
#[derive(Debug, Clone, PartialEq)]
pub struct IcConfig {
    pub linear_angle_threshold: f64,
    /// Relative eigenvalue cutoff for pseudo-inverses and delocalization.
    pub pseudo_inverse_tolerance: f64,
    pub newton_max_iterations: usize,
    /// Norm of the Cartesian step below which the back-transformation has converged.
    pub newton_convergence_tolerance: f64,
    /// Multiplier on the covalent radius sum used for bond perception.
    pub bond_scale_factor: f64,
    /// Largest atomic displacement from the basis reference geometry before the instance is
    /// flagged stale.
    pub stale_displacement_threshold: f64,
    pub include_out_of_plane: bool,
}

impl Default for IcConfig {
    fn default() -> Self {
        Self {
            linear_angle_threshold: DEFAULT_LINEAR_ANGLE_THRESHOLD,
            pseudo_inverse_tolerance: 1e-6,
            newton_max_iterations: 50,
            newton_convergence_tolerance: 1e-10,
            bond_scale_factor: DEFAULT_BOND_SCALE_FACTOR,
            stale_displacement_threshold: 1.0,
            include_out_of_plane: true,
        }
    }
}

impl IcConfig {
    pub fn builder() -> IcConfigBuilder {
        IcConfigBuilder::new()
    }

    pub fn primitive_options(&self, include_external: bool) -> PrimitiveOptions {
        PrimitiveOptions {
            linear_angle_threshold: self.linear_angle_threshold,
            include_out_of_plane: self.include_out_of_plane,
            include_external,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.linear_angle_threshold > FRAC_PI_2 && self.linear_angle_threshold < PI) {
            return Err(ConfigError::InvalidValue {
                parameter: "linear_angle_threshold",
                value: self.linear_angle_threshold,
                reason: "must lie strictly between pi/2 and pi",
            });
        }
        positive("pseudo_inverse_tolerance", self.pseudo_inverse_tolerance)?;
        positive("newton_convergence_tolerance", self.newton_convergence_tolerance)?;
        positive("bond_scale_factor", self.bond_scale_factor)?;
        positive("stale_displacement_threshold", self.stale_displacement_threshold)?;
        if self.newton_max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "newton_max_iterations",
                value: 0.0,
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

fn positive(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            parameter,
            value,
            reason: "must be a positive finite number",
        })
    }
}

/// Builder over [`IcConfig`]; unset fields keep their defaults.
#[derive(Default)]
pub struct IcConfigBuilder {
    linear_angle_threshold: Option<f64>,
    pseudo_inverse_tolerance: Option<f64>,
    newton_max_iterations: Option<usize>,
    newton_convergence_tolerance: Option<f64>,
    bond_scale_factor: Option<f64>,
    stale_displacement_threshold: Option<f64>,
    include_out_of_plane: Option<bool>,
}

impl IcConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn linear_angle_threshold(mut self, radians: f64) -> Self {
        self.linear_angle_threshold = Some(radians);
        self
    }
    pub fn pseudo_inverse_tolerance(mut self, tolerance: f64) -> Self {
        self.pseudo_inverse_tolerance = Some(tolerance);
        self
    }
    pub fn newton_max_iterations(mut self, iterations: usize) -> Self {
        self.newton_max_iterations = Some(iterations);
        self
    }
    pub fn newton_convergence_tolerance(mut self, tolerance: f64) -> Self {
        self.newton_convergence_tolerance = Some(tolerance);
        self
    }
    pub fn bond_scale_factor(mut self, factor: f64) -> Self {
        self.bond_scale_factor = Some(factor);
        self
    }
    pub fn stale_displacement_threshold(mut self, bohr: f64) -> Self {
        self.stale_displacement_threshold = Some(bohr);
        self
    }
    pub fn include_out_of_plane(mut self, include: bool) -> Self {
        self.include_out_of_plane = Some(include);
        self
    }

    pub fn build(self) -> Result<IcConfig, ConfigError> {
        let defaults = IcConfig::default();
        let config = IcConfig {
            linear_angle_threshold: self
                .linear_angle_threshold
                .unwrap_or(defaults.linear_angle_threshold),
            pseudo_inverse_tolerance: self
                .pseudo_inverse_tolerance
                .unwrap_or(defaults.pseudo_inverse_tolerance),
            newton_max_iterations: self
                .newton_max_iterations
                .unwrap_or(defaults.newton_max_iterations),
            newton_convergence_tolerance: self
                .newton_convergence_tolerance
                .unwrap_or(defaults.newton_convergence_tolerance),
            bond_scale_factor: self.bond_scale_factor.unwrap_or(defaults.bond_scale_factor),
            stale_displacement_threshold: self
                .stale_displacement_threshold
                .unwrap_or(defaults.stale_displacement_threshold),
            include_out_of_plane: self
                .include_out_of_plane
                .unwrap_or(defaults.include_out_of_plane),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_without_overrides_yields_defaults() {
        let config = IcConfigBuilder::new().build().unwrap();
        assert_eq!(config, IcConfig::default());
        assert!((config.linear_angle_threshold - 0.95 * PI).abs() < 1e-15);
        assert_eq!(config.newton_max_iterations, 50);
        assert_eq!(config.bond_scale_factor, 1.2);
    }

    #[test]
    fn builder_applies_overrides() {
        let config = IcConfig::builder()
            .newton_max_iterations(10)
            .pseudo_inverse_tolerance(1e-8)
            .include_out_of_plane(false)
            .build()
            .unwrap();
        assert_eq!(config.newton_max_iterations, 10);
        assert_eq!(config.pseudo_inverse_tolerance, 1e-8);
        assert!(!config.include_out_of_plane);
    }

    #[test]
    fn builder_rejects_threshold_outside_open_interval() {
        let err = IcConfig::builder()
            .linear_angle_threshold(PI)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "linear_angle_threshold",
                ..
            }
        ));
        assert!(IcConfig::builder().linear_angle_threshold(1.0).build().is_err());
    }

    #[test]
    fn builder_rejects_non_positive_values() {
        assert!(IcConfig::builder().bond_scale_factor(0.0).build().is_err());
        assert!(IcConfig::builder().newton_convergence_tolerance(-1.0).build().is_err());
        assert!(IcConfig::builder().pseudo_inverse_tolerance(f64::NAN).build().is_err());
        assert!(IcConfig::builder().newton_max_iterations(0).build().is_err());
    }

    #[test]
    fn primitive_options_carry_config_values() {
        let config = IcConfig::builder().include_out_of_plane(false).build().unwrap();
        let options = config.primitive_options(true);
        assert!(options.include_external);
        assert!(!options.include_out_of_plane);
        assert_eq!(options.linear_angle_threshold, config.linear_angle_threshold);
    }
}
