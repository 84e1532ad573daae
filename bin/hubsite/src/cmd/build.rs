//! Build commands - full build and the partial page/asset builds

use std::{path::Path, time::Instant};

use color_eyre::eyre::{Result, WrapErr};
use hubsite_generator::{BuildStats, Builder};

use super::load_config;

/// Which pipelines a build runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Clean, then pages and assets.
    All,
    /// Pages only, no clean.
    Pages,
    /// Assets only, no clean.
    Assets,
}

/// Run a build command.
pub fn run(root: &Path, config_path: &Path, target: Target) -> Result<()> {
    let start = Instant::now();
    tracing::info!(?root, ?config_path, ?target, "Starting build");

    let config = load_config(root, config_path)?;
    let builder = Builder::new(config, root);
    let stats = run_target(&builder, target)?;

    let duration = start.elapsed();
    print_build_stats(&stats, target);
    println!("  Duration:   {:.2}s", duration.as_secs_f64());
    println!("  Output:     {}", builder.output_dir().display());
    println!();

    tracing::info!(?stats, ?duration, "Build completed successfully");
    Ok(())
}

/// Run the pipelines for `target` on an existing builder.
pub fn run_target(builder: &Builder, target: Target) -> Result<BuildStats> {
    match target {
        Target::All => builder.build().wrap_err("Build failed"),
        Target::Pages => builder.build_pages().wrap_err("Page build failed"),
        Target::Assets => builder.build_assets().wrap_err("Asset build failed"),
    }
}

fn print_build_stats(stats: &BuildStats, target: Target) {
    println!();
    println!("  Build completed successfully!");
    println!();
    if target != Target::Assets {
        println!("  Pages:      {}", stats.pages);
    }
    if target != Target::Pages {
        println!("  Assets:     {}", stats.assets);
    }
    if target == Target::All {
        println!("  Metadata:   {}", stats.metadata_files);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use std::fs;

    use hubsite_core::Config;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_run_target_pages() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pages")).unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::write(dir.path().join("templates/default.html"), "{{ content }}").unwrap();
        fs::write(dir.path().join("pages/home.md"), "---\nlayout: default\n---\nHi\n").unwrap();

        let builder = Builder::new(Config::default(), dir.path());
        let stats = run_target(&builder, Target::Pages).unwrap();

        assert_eq!(stats.pages, 1);
        assert!(dir.path().join("dist/index.html").exists());
    }
}
