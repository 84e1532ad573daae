//! Command implementations.

pub mod build;
pub mod check;
pub mod clean;
pub mod serve;

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use hubsite_core::Config;

/// Resolve the config path against the project root.
pub fn config_path(root: &Path, config: &Path) -> PathBuf {
    if config.is_absolute() {
        config.to_path_buf()
    } else {
        root.join(config)
    }
}

/// Load configuration with environment overrides, then size the rayon pool.
pub fn load_config(root: &Path, config: &Path) -> Result<Config> {
    let path = config_path(root, config);
    let config = Config::load_with_env(&path)
        .wrap_err_with(|| format!("Failed to load configuration from {}", path.display()))?;

    let threads = config.effective_threads();
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        tracing::debug!(error = %e, "rayon pool already initialized");
    } else {
        tracing::debug!(threads, "configured worker threads");
    }

    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}
