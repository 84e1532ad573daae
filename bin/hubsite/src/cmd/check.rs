//! Check command - validate configuration, pages and layouts

use std::path::Path;

use color_eyre::eyre::{Result, bail};
use hubsite_core::{Config, Page};
use hubsite_generator::Builder;

use super::load_config;

/// Validation result.
#[derive(Debug, Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Run the check command.
///
/// Loads the configuration, every page and every layout the pages name,
/// without writing any output.
pub fn run(root: &Path, config_path: &Path, strict: bool) -> Result<()> {
    tracing::info!(?root, ?config_path, strict, "Checking configuration and content");

    let mut result = ValidationResult::default();

    println!("Checking configuration...");
    let config = match load_config(root, config_path) {
        Ok(c) => {
            println!("  ✓ Configuration valid");
            Some(c)
        }
        Err(e) => {
            result.add_error(format!("Configuration error: {e:#}"));
            println!("  ✗ Configuration invalid: {e:#}");
            None
        }
    };

    if let Some(config) = config {
        let builder = Builder::new(config, root);

        println!("\nChecking directories...");
        check_directories(&builder, &mut result);

        println!("\nChecking pages and layouts...");
        match builder.check() {
            Ok(pages) => {
                println!("  ✓ {} page(s) valid", pages.len());
                check_pages(&pages, &mut result);
            }
            Err(e) => {
                result.add_error(e.to_string());
                println!("  ✗ {e}");
            }
        }

        println!("\nChecking configuration values...");
        check_config_values(builder.config(), root, &mut result);
    }

    println!();
    println!("Summary:");
    println!("  Errors:   {}", result.errors.len());
    println!("  Warnings: {}", result.warnings.len());

    if result.has_errors() {
        println!();
        println!("Errors:");
        for err in &result.errors {
            println!("  ✗ {err}");
        }
    }

    if result.has_warnings() {
        println!();
        println!("Warnings:");
        for warn in &result.warnings {
            println!("  ⚠ {warn}");
        }
    }

    if result.has_errors() {
        bail!("Validation failed with {} error(s)", result.errors.len());
    }

    if strict && result.has_warnings() {
        bail!(
            "Validation failed with {} warning(s) (strict mode)",
            result.warnings.len()
        );
    }

    println!();
    println!("✓ All checks passed");

    Ok(())
}

fn check_directories(builder: &Builder, result: &mut ValidationResult) {
    for (name, dir) in [
        ("pages", builder.pages_dir()),
        ("templates", builder.templates_dir()),
        ("assets", builder.assets_dir()),
    ] {
        if dir.is_dir() {
            println!("  ✓ {name}/ found");
        } else {
            result.add_warning(format!("{name} directory {} does not exist", dir.display()));
        }
    }
}

fn check_pages(pages: &[Page], result: &mut ValidationResult) {
    if pages.is_empty() {
        result.add_warning("No pages found");
        return;
    }

    if !pages.iter().any(Page::is_root) {
        result.add_warning("No root page: nothing will be written to index.html");
    }

    for page in pages {
        if !page.metadata.contains_key("title") {
            result.add_warning(format!("{} has no title", page.source.display()));
        }
    }
}

fn check_config_values(config: &Config, root: &Path, result: &mut ValidationResult) {
    if config.site.title.is_empty() {
        result.add_warning("site.title is empty");
    }

    if config.site.version.is_none() && !root.join(&config.paths.project_metadata).exists() {
        result.add_warning(format!(
            "No site.version and no {}: pages will show version {}",
            config.paths.project_metadata,
            hubsite_core::content::FALLBACK_VERSION
        ));
    }

    for file in &config.paths.metadata_files {
        if !root.join(file).is_file() {
            result.add_error(format!("Metadata file {file} does not exist"));
        }
    }
}
