//! Content types and structures.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{CoreError, Result},
    frontmatter::{Metadata, parse_frontmatter},
};

/// Slug of the page rendered at the output root.
pub const ROOT_SLUG: &str = "index";

/// Fallback version when neither the config nor the project metadata has one.
pub const FALLBACK_VERSION: &str = "0.0.0";

/// A page loaded from one Markdown source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// URL slug, `index` for the root page.
    pub slug: String,

    /// Layout (template) name.
    pub layout: String,

    /// All front matter keys, `layout` included.
    pub metadata: Metadata,

    /// Markdown body after the front matter block.
    pub raw_body: String,

    /// Source file the page was loaded from.
    pub source: PathBuf,
}

impl Page {
    /// Read and parse a page source file.
    pub fn load(path: &Path, root_aliases: &[String]) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        Self::parse(&content, path, root_aliases)
    }

    /// Parse page source text.
    ///
    /// The slug is the `slug` front matter key when present, otherwise the
    /// file stem; stems listed in `root_aliases` map to [`ROOT_SLUG`].
    pub fn parse(content: &str, path: &Path, root_aliases: &[String]) -> Result<Self> {
        let (metadata, raw_body) = parse_frontmatter(content, path)?;

        let layout = metadata
            .get("layout")
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| CoreError::missing_layout(path))?
            .to_string();

        let slug = match metadata.get("slug").map(|s| s.trim().trim_matches('/')) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .ok_or_else(|| CoreError::frontmatter(path, "file name is not valid UTF-8"))?;
                if root_aliases.iter().any(|alias| alias == stem) {
                    ROOT_SLUG.to_string()
                } else {
                    stem.to_string()
                }
            }
        };

        Ok(Self {
            slug,
            layout,
            metadata,
            raw_body,
            source: path.to_path_buf(),
        })
    }

    /// Whether this page renders at the output root.
    pub fn is_root(&self) -> bool {
        self.slug == ROOT_SLUG
    }
}

/// Site-wide template variables, built once per build and read-only after.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteMetadata {
    vars: BTreeMap<String, String>,
}

impl SiteMetadata {
    /// Create site metadata from explicit variables.
    pub fn new(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Build site metadata from the `[site]` config table.
    ///
    /// `version` comes from `site.version`, then from the `version` field of
    /// the project metadata file under `root`.
    pub fn load(config: &Config, root: &Path) -> Result<Self> {
        let mut vars = config.site.vars.clone();
        vars.insert("title".to_string(), config.site.title.clone());
        if let Some(base_url) = &config.site.base_url {
            vars.insert("base_url".to_string(), base_url.clone());
        }

        let version = match &config.site.version {
            Some(version) => version.clone(),
            None => {
                let metadata_path = root.join(&config.paths.project_metadata);
                match read_project_version(&metadata_path)? {
                    Some(version) => version,
                    None => {
                        tracing::warn!(
                            path = %metadata_path.display(),
                            fallback = FALLBACK_VERSION,
                            "no site version configured"
                        );
                        FALLBACK_VERSION.to_string()
                    }
                }
            }
        };
        vars.insert("version".to_string(), version);

        Ok(Self { vars })
    }

    /// Get a variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The build's version string.
    pub fn version(&self) -> &str {
        self.get("version").unwrap_or(FALLBACK_VERSION)
    }

    /// Iterate over all variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Read the `version` field of a JSON project metadata file, if any.
fn read_project_version(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    Ok(value
        .get("version")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string))
}

/// Asset category, selecting which transforms apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// JavaScript.
    Script,
    /// CSS.
    Style,
    /// Raster or vector image.
    Image,
    /// Anything else, copied as-is.
    Other,
}

impl AssetKind {
    /// Determine asset kind from file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" => Self::Script,
            "css" => Self::Style,
            "svg" | "png" | "jpg" | "jpeg" | "gif" | "webp" => Self::Image,
            _ => Self::Other,
        }
    }

    /// Determine asset kind from a path.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(Self::Other, Self::from_extension)
    }
}

/// A static asset discovered under the assets directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Absolute (or root-relative) source path.
    pub source_path: PathBuf,

    /// Path relative to the assets directory, preserved in the output.
    pub relative_path: PathBuf,

    /// Asset category.
    pub kind: AssetKind,
}

impl Asset {
    /// Create an asset, inferring its kind from the extension.
    pub fn new(source_path: impl Into<PathBuf>, relative_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let kind = AssetKind::from_path(&source_path);
        Self {
            source_path,
            relative_path: relative_path.into(),
            kind,
        }
    }
}
