use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The CASTIC Developers",
    version,
    about = "CASTIC CLI - Inspect and exercise translation-rotation internal coordinates (TRIC) of molecular geometries.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the coordinate system of a geometry and summarize it.
    Analyze(AnalyzeArgs),
    /// Displace along every delocalized coordinate, back-transform and undo the step.
    Roundtrip(RoundtripArgs),
}

/// Options shared by every subcommand that builds a coordinate system.
#[derive(Args, Debug, Clone)]
pub struct CoordinateArgs {
    /// Path to the input geometry in XYZ format (positions in Ångström).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the bond perception scale factor from the config file.
    #[arg(long, value_name = "FLOAT")]
    pub bond_scale: Option<f64>,

    /// Do not generate out-of-plane coordinates.
    #[arg(long)]
    pub no_out_of_plane: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S back-transformation.max-iterations=100
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub coordinates: CoordinateArgs,

    /// List every primitive coordinate with its value.
    #[arg(long)]
    pub primitives: bool,

    /// Write the bond graph in Graphviz DOT format to this path.
    #[arg(long, value_name = "PATH")]
    pub dot: Option<PathBuf>,
}

/// Arguments for the `roundtrip` subcommand.
#[derive(Args, Debug)]
pub struct RoundtripArgs {
    #[command(flatten)]
    pub coordinates: CoordinateArgs,

    /// Displacement applied to each delocalized coordinate (atomic units).
    #[arg(long, value_name = "FLOAT", default_value_t = castic::workflows::roundtrip::DEFAULT_STEP)]
    pub step: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_parses_input_and_repeated_set_values() {
        let cli = Cli::parse_from([
            "castic",
            "-vv",
            "analyze",
            "-i",
            "water.xyz",
            "-S",
            "coordinates.bond-scale-factor=1.3",
            "-S",
            "back-transformation.max-iterations=80",
            "--primitives",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Analyze(args) = cli.command else {
            panic!("Expected 'analyze' subcommand");
        };
        assert_eq!(args.coordinates.input, PathBuf::from("water.xyz"));
        assert_eq!(args.coordinates.set_values.len(), 2);
        assert!(args.primitives);
        assert!(args.coordinates.config.is_none());
        assert!(args.dot.is_none());
    }

    #[test]
    fn analyze_accepts_a_dot_output_path() {
        let cli = Cli::parse_from(["castic", "analyze", "-i", "water.xyz", "--dot", "water.dot"]);
        let Commands::Analyze(args) = cli.command else {
            panic!("Expected 'analyze' subcommand");
        };
        assert_eq!(args.dot, Some(PathBuf::from("water.dot")));
    }

    #[test]
    fn roundtrip_step_defaults_and_overrides() {
        let cli = Cli::parse_from(["castic", "roundtrip", "-i", "h2o2.xyz"]);
        let Commands::Roundtrip(args) = cli.command else {
            panic!("Expected 'roundtrip' subcommand");
        };
        assert_eq!(args.step, 0.01);

        let cli = Cli::parse_from(["castic", "roundtrip", "-i", "h2o2.xyz", "--step", "0.05"]);
        let Commands::Roundtrip(args) = cli.command else {
            panic!("Expected 'roundtrip' subcommand");
        };
        assert_eq!(args.step, 0.05);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["castic", "-q", "-v", "analyze", "-i", "a.xyz"]);
        assert!(result.is_err());
    }
}
