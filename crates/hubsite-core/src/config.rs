//! Site configuration management.
//!
//! Everything lives in one optional `hubsite.toml`. Every field has a default,
//! so a bare project with `pages/`, `templates/` and `assets/` builds without
//! any configuration at all.

use std::{
    collections::BTreeMap,
    path::{Component, Path},
};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Browser support matrix used for CSS vendor prefixing.
pub const DEFAULT_BROWSERS: &[&str] = &[
    "ie >= 10",
    "ie_mob >= 10",
    "ff >= 30",
    "chrome >= 34",
    "safari >= 7",
    "opera >= 23",
    "ios >= 7",
    "android >= 4.4",
    "bb >= 10",
];

/// Main configuration structure for hubsite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide template variables.
    #[serde(default)]
    pub site: SiteConfig,

    /// Input and output locations, relative to the project root.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Page loading settings.
    #[serde(default)]
    pub pages: PagesConfig,

    /// Asset transform settings.
    #[serde(default)]
    pub assets: AssetsConfig,

    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Content rewriting settings.
    #[serde(default)]
    pub rewrite: RewriteConfig,

    /// Development server settings.
    #[serde(default)]
    pub serve: ServeConfig,
}

/// Site-wide configuration, exposed to templates as `site.*`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site title.
    #[serde(default)]
    pub title: String,

    /// Product version. Falls back to the project metadata file when unset.
    #[serde(default)]
    pub version: Option<String>,

    /// Base URL for the site (e.g., "https://example.com").
    #[serde(default)]
    pub base_url: Option<String>,

    /// Any other string variables.
    #[serde(default, flatten)]
    pub vars: BTreeMap<String, String>,
}

/// Source and output directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Markdown page sources.
    #[serde(default = "default_pages_dir")]
    pub pages: String,

    /// Layout templates, one `<layout>.html` per layout.
    #[serde(default = "default_templates_dir")]
    pub templates: String,

    /// Static assets.
    #[serde(default = "default_assets_dir")]
    pub assets: String,

    /// Output root.
    #[serde(default = "default_output_dir")]
    pub output: String,

    /// Asset directory inside the output root.
    #[serde(default = "default_assets_output")]
    pub assets_output: String,

    /// Files copied verbatim to the output root (e.g. `package.json`).
    #[serde(default)]
    pub metadata_files: Vec<String>,

    /// JSON file whose `version` field supplies `site.version` when unset.
    #[serde(default = "default_project_metadata")]
    pub project_metadata: String,
}

/// Page loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesConfig {
    /// File stems that render as the site root (`index.html`).
    #[serde(default = "default_root_aliases")]
    pub root_aliases: Vec<String>,
}

/// Asset transform configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Browserslist queries for CSS vendor prefixing.
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    /// Minify `.js` assets.
    #[serde(default = "default_true")]
    pub minify_scripts: bool,

    /// Add vendor prefixes to `.css` assets.
    #[serde(default = "default_true")]
    pub prefix_styles: bool,

    /// Minify `.css` assets.
    #[serde(default = "default_true")]
    pub minify_styles: bool,

    /// Optimize PNG, JPEG and SVG assets.
    #[serde(default = "default_true")]
    pub optimize_images: bool,

    /// JPEG re-encode quality (1-100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

/// Build configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Whether to minify HTML output.
    #[serde(default)]
    pub minify_html: bool,

    /// Worker thread cap. Defaults to the number of cores.
    #[serde(default)]
    pub threads: Option<usize>,
}

/// Content rewriting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Token replaced with the site version in pages and scripts.
    #[serde(default = "default_version_placeholder")]
    pub version_placeholder: String,

    /// Extra substitutions applied to pages after the built-in ones.
    #[serde(default)]
    pub rules: Vec<RewriteRuleConfig>,
}

/// A single configured substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRuleConfig {
    /// Text (or pattern when `regex` is set) to look for.
    pub find: String,

    /// Replacement. Regex rules may use `$1`-style group references.
    pub replace: String,

    /// Treat `find` as a regular expression.
    #[serde(default)]
    pub regex: bool,
}

/// Development server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Quiet period before a batch of file changes triggers a rebuild.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

// Default value functions
fn default_pages_dir() -> String {
    "pages".to_string()
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_assets_output() -> String {
    "assets".to_string()
}

fn default_project_metadata() -> String {
    "package.json".to_string()
}

fn default_root_aliases() -> Vec<String> {
    vec!["index".to_string(), "home".to_string()]
}

fn default_browsers() -> Vec<String> {
    DEFAULT_BROWSERS.iter().map(|b| (*b).to_string()).collect()
}

fn default_true() -> bool {
    true
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_version_placeholder() -> String {
    "$$version$$".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_debounce_ms() -> u64 {
    200
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pages: default_pages_dir(),
            templates: default_templates_dir(),
            assets: default_assets_dir(),
            output: default_output_dir(),
            assets_output: default_assets_output(),
            metadata_files: Vec::new(),
            project_metadata: default_project_metadata(),
        }
    }
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            root_aliases: default_root_aliases(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            browsers: default_browsers(),
            minify_scripts: true,
            prefix_styles: true,
            minify_styles: true,
            optimize_images: true,
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            version_placeholder: default_version_placeholder(),
            rules: Vec::new(),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration layered with `HUBSITE__SECTION__KEY` environment
    /// overrides. A missing file is not an error: defaults apply.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        Self::load_layered(path, environment())
    }

    fn load_layered(path: &Path, env: config::Environment) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
        }

        // Values stay strings; typed fields are converted on deserialize, so
        // `1.10` is never read as the float `1.1`.
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(env)
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.assets.jpeg_quality) {
            return Err(CoreError::config(format!(
                "assets.jpeg_quality must be between 1 and 100, got {}",
                self.assets.jpeg_quality
            )));
        }

        if self.rewrite.version_placeholder.is_empty() {
            return Err(CoreError::config("rewrite.version_placeholder cannot be empty"));
        }

        if !is_plain_relative(&self.paths.assets_output) {
            return Err(CoreError::config(format!(
                "paths.assets_output must be a relative path inside the output root, got {:?}",
                self.paths.assets_output
            )));
        }

        for file in &self.paths.metadata_files {
            if !is_plain_relative(file) {
                return Err(CoreError::config(format!(
                    "paths.metadata_files entries must be relative paths, got {file:?}"
                )));
            }
        }

        if self.build.threads == Some(0) {
            return Err(CoreError::config("build.threads must be at least 1"));
        }

        if self.site.base_url.as_deref().is_some_and(|u| u.ends_with('/')) {
            tracing::warn!("site.base_url should not have a trailing slash");
        }

        Ok(())
    }

    /// Number of worker threads to use: the configured cap, never above the
    /// number of available cores.
    pub fn effective_threads(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        self.build.threads.map_or(cores, |t| t.min(cores))
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("HUBSITE").separator("__")
}

/// True for a non-empty relative path made only of normal components.
fn is_plain_relative(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}
