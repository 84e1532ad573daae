//! Pretty-URL output paths.

use std::path::{Component, Path, PathBuf};

use hubsite_core::content::ROOT_SLUG;
use thiserror::Error;

/// Output path errors.
#[derive(Debug, Error)]
pub enum PathError {
    /// Slug would escape the output root or is otherwise unusable.
    #[error("invalid slug `{slug}`: {reason}")]
    InvalidSlug { slug: String, reason: &'static str },
}

/// Maps page slugs to files under the output root.
///
/// `index` becomes `<out>/index.html`; every other slug `s` becomes
/// `<out>/s/index.html`.
#[derive(Debug, Clone)]
pub struct OutputPathResolver {
    output_dir: PathBuf,
}

impl OutputPathResolver {
    /// Create a resolver rooted at `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Output root.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resolve the file a page with `slug` is written to.
    pub fn resolve(&self, slug: &str) -> Result<PathBuf, PathError> {
        validate_slug(slug)?;

        if slug == ROOT_SLUG {
            return Ok(self.output_dir.join("index.html"));
        }

        let mut path = self.output_dir.clone();
        for segment in slug.split('/') {
            path.push(segment);
        }
        path.push("index.html");
        Ok(path)
    }
}

fn validate_slug(slug: &str) -> Result<(), PathError> {
    let invalid = |reason| PathError::InvalidSlug {
        slug: slug.to_string(),
        reason,
    };

    if slug.is_empty() {
        return Err(invalid("empty"));
    }
    if slug.contains('\\') {
        return Err(invalid("contains a backslash"));
    }
    if slug.starts_with('/') {
        return Err(invalid("absolute"));
    }
    if slug.split('/').any(str::is_empty) {
        return Err(invalid("empty path segment"));
    }
    for component in Path::new(slug).components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir | Component::ParentDir => {
                return Err(invalid("contains `.` or `..`"));
            }
            Component::RootDir | Component::Prefix(_) => return Err(invalid("absolute")),
        }
    }
    // `Path::components` folds `a/./b`; check raw segments too.
    if slug.split('/').any(|s| s == "." || s == "..") {
        return Err(invalid("contains `.` or `..`"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> OutputPathResolver {
        OutputPathResolver::new("/site/dist")
    }

    #[test]
    fn test_root_page() {
        assert_eq!(
            resolver().resolve("index").unwrap(),
            PathBuf::from("/site/dist/index.html")
        );
    }

    #[test]
    fn test_pretty_url() {
        assert_eq!(
            resolver().resolve("about").unwrap(),
            PathBuf::from("/site/dist/about/index.html")
        );
    }

    #[test]
    fn test_nested_slug() {
        assert_eq!(
            resolver().resolve("docs/intro").unwrap(),
            PathBuf::from("/site/dist/docs/intro/index.html")
        );
    }

    #[test]
    fn test_traversal_rejected() {
        for slug in [
            "",
            "..",
            "../etc",
            "docs/../../x",
            "./about",
            "a/./b",
            "/abs",
            "a\\b",
            "a//b",
            "trailing/",
        ] {
            assert!(
                matches!(resolver().resolve(slug), Err(PathError::InvalidSlug { .. })),
                "{slug:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolved_paths_stay_under_root() {
        let resolver = resolver();
        for slug in ["index", "pricing", "signin_success", "docs/api/v1"] {
            let path = resolver.resolve(slug).unwrap();
            assert!(path.starts_with(resolver.output_dir()));
        }
    }
}
