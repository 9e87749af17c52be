pub mod analyze;
pub mod roundtrip;

use crate::cli::CoordinateArgs;
use crate::config::PartialIcConfig;
use crate::error::{CliError, Result};
use crate::xyz::XyzFrame;
use castic::core::models::atom::Molecule;
use castic::engine::config::IcConfig;
use tracing::info;

/// Resolves the configuration and reads the input geometry shared by all subcommands.
fn prepare(args: &CoordinateArgs) -> Result<(Molecule, IcConfig)> {
    info!("Merging configuration from file and CLI arguments...");
    let config = PartialIcConfig::load(args)?;

    info!("Loading input geometry from {:?}", &args.input);
    let frame = XyzFrame::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;
    if !frame.comment.is_empty() {
        info!(comment = %frame.comment, "Read XYZ frame");
    }
    Ok((frame.molecule, config))
}
