//! Frontmatter parsing for page sources.

use std::{collections::BTreeMap, path::Path};

use crate::error::{CoreError, Result};

/// Flat page metadata: every front matter key rendered as a string.
pub type Metadata = BTreeMap<String, String>;

/// Delimiter types for frontmatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontmatterFormat {
    /// YAML frontmatter delimited by `---`.
    Yaml,
    /// TOML frontmatter delimited by `+++`.
    Toml,
}

impl FrontmatterFormat {
    /// Get the delimiter string for this format.
    pub fn delimiter(&self) -> &'static str {
        match self {
            Self::Yaml => "---",
            Self::Toml => "+++",
        }
    }
}

/// Split content into frontmatter and body.
///
/// The opening delimiter must be the very first line and the closing one a
/// line of its own. The body is returned untouched, starting right after the
/// closing delimiter's line break.
pub fn split_frontmatter(content: &str) -> Option<(FrontmatterFormat, &str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let first_line = content.lines().next()?;

    let format = match first_line.trim_end() {
        "---" => FrontmatterFormat::Yaml,
        "+++" => FrontmatterFormat::Toml,
        _ => return None,
    };
    let delimiter = format.delimiter();

    let after_open = content[first_line.len()..]
        .strip_prefix("\r\n")
        .or_else(|| content[first_line.len()..].strip_prefix('\n'))?;

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == delimiter {
            let frontmatter = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return Some((format, frontmatter, body));
        }
        offset += line.len();
    }

    None
}

/// Parse frontmatter from a string into flat metadata and the raw body.
///
/// Content without a frontmatter block yields empty metadata and the full
/// content as body.
pub fn parse_frontmatter(content: &str, path: &Path) -> Result<(Metadata, String)> {
    let Some((format, fm_str, body)) = split_frontmatter(content) else {
        return Ok((Metadata::new(), content.to_string()));
    };

    let metadata = match format {
        FrontmatterFormat::Yaml => parse_yaml(fm_str, path)?,
        FrontmatterFormat::Toml => parse_toml(fm_str, path)?,
    };

    Ok((metadata, body.to_string()))
}

fn parse_yaml(fm_str: &str, path: &Path) -> Result<Metadata> {
    if fm_str.trim().is_empty() {
        return Ok(Metadata::new());
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(fm_str).map_err(|e| CoreError::frontmatter(path, e.to_string()))?;

    let serde_yaml::Value::Mapping(mapping) = value else {
        return Err(CoreError::frontmatter(path, "frontmatter must be a mapping"));
    };

    let mut metadata = Metadata::new();
    for (key, value) in mapping {
        let key = yaml_scalar(&key)
            .ok_or_else(|| CoreError::frontmatter(path, "frontmatter keys must be scalars"))?;
        metadata.insert(key, yaml_to_string(&value));
    }
    Ok(metadata)
}

fn parse_toml(fm_str: &str, path: &Path) -> Result<Metadata> {
    let table: toml::Table =
        toml::from_str(fm_str).map_err(|e| CoreError::frontmatter(path, e.to_string()))?;

    Ok(table
        .into_iter()
        .map(|(key, value)| (key, toml_to_string(&value)))
        .collect())
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Tagged(tagged) => yaml_scalar(&tagged.value),
        serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => None,
    }
}

fn yaml_to_string(value: &serde_yaml::Value) -> String {
    if let Some(scalar) = yaml_scalar(value) {
        return scalar;
    }
    match value {
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .map(yaml_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn toml_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(toml_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        toml::Value::Table(table) => serde_json::to_string(table).unwrap_or_default(),
        other => other.to_string(),
    }
}
