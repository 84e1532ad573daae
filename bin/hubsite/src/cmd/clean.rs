//! Clean command - removes the output directory

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use hubsite_generator::Builder;

use super::load_config;

/// Run the clean command.
pub fn run(root: &Path, config_path: &Path) -> Result<()> {
    let config = load_config(root, config_path)?;
    let builder = Builder::new(config, root);

    builder.clean().wrap_err("Clean failed")?;
    println!("  Removed {}", builder.output_dir().display());
    Ok(())
}
