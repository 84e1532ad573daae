//! Page discovery and loading.

use std::{
    fs,
    path::{Path, PathBuf},
};

use hubsite_core::{CoreError, Page};
use rayon::prelude::*;
use tracing::{debug, info};

/// Extensions recognized as page sources.
pub const PAGE_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Loads every page source directly under the pages directory.
#[derive(Debug, Clone)]
pub struct ContentLoader {
    pages_dir: PathBuf,
    root_aliases: Vec<String>,
}

impl ContentLoader {
    /// Create a loader for `pages_dir`.
    #[must_use]
    pub fn new(pages_dir: impl Into<PathBuf>, root_aliases: Vec<String>) -> Self {
        Self {
            pages_dir: pages_dir.into(),
            root_aliases,
        }
    }

    /// Pages directory.
    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    /// Find page source files, sorted by path. A missing directory yields none.
    pub fn find_sources(&self) -> Result<Vec<PathBuf>, CoreError> {
        if !self.pages_dir.is_dir() {
            debug!(dir = %self.pages_dir.display(), "pages directory does not exist");
            return Ok(Vec::new());
        }

        let entries =
            fs::read_dir(&self.pages_dir).map_err(|e| CoreError::io(&self.pages_dir, e))?;

        let mut sources = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::io(&self.pages_dir, e))?;
            let path = entry.path();

            if is_hidden(&path) || !path.is_file() {
                continue;
            }
            if is_page_source(&path) {
                sources.push(path);
            }
        }

        sources.sort();
        Ok(sources)
    }

    /// Load and validate every page. Fails on the first invalid page, in
    /// source order, before anything is rendered.
    pub fn load_all(&self) -> Result<Vec<Page>, CoreError> {
        let sources = self.find_sources()?;
        info!(
            dir = %self.pages_dir.display(),
            count = sources.len(),
            "loading pages"
        );

        let pages = sources
            .par_iter()
            .map(|path| Page::load(path, &self.root_aliases))
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        for page in &pages {
            debug!(slug = %page.slug, layout = %page.layout, "loaded page");
        }
        Ok(pages)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn is_page_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| PAGE_EXTENSIONS.iter().any(|p| e.eq_ignore_ascii_case(p)))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn aliases() -> Vec<String> {
        vec!["index".to_string(), "home".to_string()]
    }

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_missing_dir_yields_no_pages() {
        let dir = TempDir::new().unwrap();
        let loader = ContentLoader::new(dir.path().join("nope"), aliases());
        assert!(loader.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_loads_sorted_markdown_only() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pricing.md", "---\nlayout: default\n---\nP");
        write(dir.path(), "about.markdown", "---\nlayout: default\n---\nA");
        write(dir.path(), "home.md", "---\nlayout: default\n---\nH");
        write(dir.path(), "notes.txt", "ignored");
        write(dir.path(), ".draft.md", "---\nlayout: default\n---\nD");
        fs::create_dir(dir.path().join("nested.md")).unwrap();

        let loader = ContentLoader::new(dir.path(), aliases());
        let slugs: Vec<_> = loader
            .load_all()
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect();

        assert_eq!(slugs, vec!["about", "index", "pricing"]);
    }

    #[test]
    fn test_missing_layout_fails() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "---\nlayout: default\n---\nok");
        write(dir.path(), "b.md", "---\ntitle: no layout\n---\nbad");

        let loader = ContentLoader::new(dir.path(), aliases());
        let err = loader.load_all().unwrap_err();
        match err {
            CoreError::MissingLayout { path } => assert!(path.ends_with("b.md")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
