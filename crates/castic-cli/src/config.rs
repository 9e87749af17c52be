use crate::cli::CoordinateArgs;
use crate::error::{CliError, Result};
use castic::engine::config::{IcConfig, IcConfigBuilder};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialCoordinatesConfig {
    #[serde(rename = "linear-angle-threshold-degrees")]
    linear_angle_threshold_degrees: Option<f64>,
    #[serde(rename = "bond-scale-factor")]
    bond_scale_factor: Option<f64>,
    #[serde(rename = "include-out-of-plane")]
    include_out_of_plane: Option<bool>,
    #[serde(rename = "pseudo-inverse-tolerance")]
    pseudo_inverse_tolerance: Option<f64>,
    #[serde(rename = "stale-displacement-threshold")]
    stale_displacement_threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialBackTransformationConfig {
    #[serde(rename = "max-iterations")]
    max_iterations: Option<usize>,
    #[serde(rename = "convergence-tolerance")]
    convergence_tolerance: Option<f64>,
}

/// Configuration file contents before CLI overrides and defaults are applied.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialIcConfig {
    coordinates: Option<PartialCoordinatesConfig>,
    #[serde(rename = "back-transformation")]
    back_transformation: Option<PartialBackTransformationConfig>,
}

impl PartialIcConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads the config file named in `args`, if any, and merges it with the CLI overrides.
    pub fn load(args: &CoordinateArgs) -> Result<IcConfig> {
        let partial = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        partial.merge_with_cli(args)
    }

    /// Precedence: dedicated CLI flags, then `--set` values, then the file, then defaults.
    pub fn merge_with_cli(mut self, args: &CoordinateArgs) -> Result<IcConfig> {
        self.apply_set_values(&args.set_values)?;

        let coordinates = self.coordinates.take().unwrap_or_default();
        let back_transformation = self.back_transformation.take().unwrap_or_default();

        let mut builder = IcConfigBuilder::new();
        if let Some(degrees) = coordinates.linear_angle_threshold_degrees {
            builder = builder.linear_angle_threshold(degrees.to_radians());
        }
        if let Some(factor) = args.bond_scale.or(coordinates.bond_scale_factor) {
            builder = builder.bond_scale_factor(factor);
        }
        if args.no_out_of_plane {
            builder = builder.include_out_of_plane(false);
        } else if let Some(include) = coordinates.include_out_of_plane {
            builder = builder.include_out_of_plane(include);
        }
        if let Some(tolerance) = coordinates.pseudo_inverse_tolerance {
            builder = builder.pseudo_inverse_tolerance(tolerance);
        }
        if let Some(bohr) = coordinates.stale_displacement_threshold {
            builder = builder.stale_displacement_threshold(bohr);
        }
        if let Some(iterations) = back_transformation.max_iterations {
            builder = builder.newton_max_iterations(iterations);
        }
        if let Some(tolerance) = back_transformation.convergence_tolerance {
            builder = builder.newton_convergence_tolerance(tolerance);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "coordinates.linear-angle-threshold-degrees" => {
                    self.coordinates
                        .get_or_insert_with(Default::default)
                        .linear_angle_threshold_degrees = Some(parse_value(key, value)?);
                }
                "coordinates.bond-scale-factor" => {
                    self.coordinates
                        .get_or_insert_with(Default::default)
                        .bond_scale_factor = Some(parse_value(key, value)?);
                }
                "coordinates.include-out-of-plane" => {
                    self.coordinates
                        .get_or_insert_with(Default::default)
                        .include_out_of_plane = Some(parse_value(key, value)?);
                }
                "coordinates.pseudo-inverse-tolerance" => {
                    self.coordinates
                        .get_or_insert_with(Default::default)
                        .pseudo_inverse_tolerance = Some(parse_value(key, value)?);
                }
                "coordinates.stale-displacement-threshold" => {
                    self.coordinates
                        .get_or_insert_with(Default::default)
                        .stale_displacement_threshold = Some(parse_value(key, value)?);
                }
                "back-transformation.max-iterations" => {
                    self.back_transformation
                        .get_or_insert_with(Default::default)
                        .max_iterations = Some(parse_value(key, value)?);
                }
                "back-transformation.convergence-tolerance" => {
                    self.back_transformation
                        .get_or_insert_with(Default::default)
                        .convergence_tolerance = Some(parse_value(key, value)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_config_file(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("castic.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn coordinate_args(extra: &[&str]) -> CoordinateArgs {
        let mut argv = vec!["castic", "analyze", "-i", "water.xyz"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Analyze(args) => args.coordinates,
            Commands::Roundtrip(_) => panic!("Expected 'analyze' subcommand"),
        }
    }

    #[test]
    fn no_file_and_no_overrides_gives_defaults() {
        let config = PartialIcConfig::load(&coordinate_args(&[])).unwrap();
        assert_eq!(config, IcConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
            [coordinates]
            linear-angle-threshold-degrees = 170.0
            bond-scale-factor = 1.3
            include-out-of-plane = false

            [back-transformation]
            max-iterations = 120
            "#,
        );
        let config =
            PartialIcConfig::load(&coordinate_args(&["-c", path.to_str().unwrap()])).unwrap();
        assert!((config.linear_angle_threshold - 170f64.to_radians()).abs() < 1e-12);
        assert_eq!(config.bond_scale_factor, 1.3);
        assert!(!config.include_out_of_plane);
        assert_eq!(config.newton_max_iterations, 120);
        assert_eq!(config.pseudo_inverse_tolerance, 1e-6);
    }

    #[test]
    fn cli_flags_and_set_values_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
            [coordinates]
            bond-scale-factor = 1.3
            include-out-of-plane = true

            [back-transformation]
            max-iterations = 120
            "#,
        );
        let config = PartialIcConfig::load(&coordinate_args(&[
            "-c",
            path.to_str().unwrap(),
            "--bond-scale",
            "1.1",
            "--no-out-of-plane",
            "-S",
            "back-transformation.max-iterations=10",
        ]))
        .unwrap();
        assert_eq!(config.bond_scale_factor, 1.1);
        assert!(!config.include_out_of_plane);
        assert_eq!(config.newton_max_iterations, 10);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(&dir, "[coordinates]\nbond-scale = 1.3\n");
        let result = PartialIcConfig::from_file(&path);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        for bad in [
            "back-transformation.max-iterations",
            "back-transformation.max-iterations=many",
            "coordinates.unknown=1",
        ] {
            let result = PartialIcConfig::load(&coordinate_args(&["-S", bad]));
            assert!(matches!(result, Err(CliError::Config(_))), "accepted '{}'", bad);
        }
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let result = PartialIcConfig::load(&coordinate_args(&[
            "-S",
            "coordinates.linear-angle-threshold-degrees=45",
        ]));
        let Err(CliError::Config(msg)) = result else {
            panic!("Expected a configuration error");
        };
        assert!(msg.contains("linear_angle_threshold"));
    }
}
