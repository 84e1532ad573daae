//! Build orchestration.
//!
//! A build cleans the output root, then runs the page pipeline and the asset
//! pipeline side by side. Builds in one process never overlap.

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use hubsite_core::{Config, CoreError, Page, SiteMetadata};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    assets::{AssetError, AssetPipeline},
    html::{PageRenderer, RenderedPage},
    loader::ContentLoader,
    output::{OutputPathResolver, PathError},
    rewrite::{ContentRewriter, RewriteError},
    template::{TemplateEngine, TemplateError},
};

static BUILD_LOCK: Mutex<()> = Mutex::new(());

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration, front matter or page loading error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Rendering a page failed.
    #[error("failed to render {path}: {source}")]
    Page {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },

    /// A configured rewrite rule is invalid.
    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    /// Asset error.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// A page slug cannot be mapped to an output path.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Two pages resolve to the same output file.
    #[error("{first} and {second} both write {path}")]
    DuplicateOutput {
        path: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    /// IO error.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stopped because the sibling pipeline failed.
    #[error("build cancelled")]
    Cancelled,
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Lifecycle of a builder's most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildState {
    #[default]
    Idle,
    Cleaning,
    Building,
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Cleaning => "cleaning",
            Self::Building => "building",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Build statistics.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Number of pages written.
    pub pages: usize,

    /// Number of assets written.
    pub assets: usize,

    /// Number of metadata files copied.
    pub metadata_files: usize,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// Site builder that orchestrates the build process.
#[derive(Debug)]
pub struct Builder {
    config: Config,
    root: PathBuf,
    inject: Option<String>,
    state: Mutex<BuildState>,
}

impl Builder {
    /// Create a builder for the project at `root`.
    #[must_use]
    pub fn new(config: Config, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
            inject: None,
            state: Mutex::new(BuildState::Idle),
        }
    }

    /// Insert `snippet` before `</body>` of every rendered page.
    #[must_use]
    pub fn with_injection(mut self, snippet: impl Into<String>) -> Self {
        self.inject = Some(snippet.into());
        self
    }

    /// Configuration this builder runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// State of the most recent run.
    pub fn state(&self) -> BuildState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Page sources directory.
    pub fn pages_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.pages)
    }

    /// Layout templates directory.
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.templates)
    }

    /// Static assets directory.
    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.assets)
    }

    /// Output root.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.output)
    }

    /// Where processed assets are written.
    pub fn assets_output_dir(&self) -> PathBuf {
        self.output_dir().join(&self.config.paths.assets_output)
    }

    /// Execute the full build: clean, then pages and assets concurrently.
    pub fn build(&self) -> Result<BuildStats> {
        let _guard = BUILD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();

        info!(
            root = %self.root.display(),
            output = %self.output_dir().display(),
            "starting build"
        );

        self.transition(BuildState::Cleaning);
        let result = self.remove_output().and_then(|()| {
            self.transition(BuildState::Building);
            let site = Arc::new(self.load_site()?);

            let cancel = AtomicBool::new(false);
            let (pages, assets) = rayon::join(
                || cancel_on_error(&cancel, self.run_pages(&site, &cancel)),
                || cancel_on_error(&cancel, self.run_assets(&site, &cancel)),
            );
            let (pages, assets) = match (pages, assets) {
                (Ok(pages), Ok(assets)) => (pages, assets),
                (Err(e), Err(other)) if e.is_cancelled() => return Err(other),
                (Err(e), _) | (_, Err(e)) => return Err(e),
            };
            let metadata_files = self.copy_metadata_files()?;

            Ok(BuildStats {
                pages,
                assets,
                metadata_files,
                duration_ms: 0,
            })
        });

        let stats = self.finish(result, start)?;
        info!(
            pages = stats.pages,
            assets = stats.assets,
            metadata_files = stats.metadata_files,
            duration_ms = stats.duration_ms,
            "build complete"
        );
        Ok(stats)
    }

    /// Remove the output root. An absent directory is not an error.
    pub fn clean(&self) -> Result<()> {
        let _guard = BUILD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        self.transition(BuildState::Cleaning);
        self.finish(self.remove_output().map(|()| BuildStats::default()), Instant::now())?;
        Ok(())
    }

    /// Run only the page pipeline, without cleaning.
    pub fn build_pages(&self) -> Result<BuildStats> {
        let _guard = BUILD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        self.transition(BuildState::Building);

        let result = self.load_site().and_then(|site| {
            let pages = self.run_pages(&Arc::new(site), &AtomicBool::new(false))?;
            Ok(BuildStats {
                pages,
                ..BuildStats::default()
            })
        });
        self.finish(result, start)
    }

    /// Run only the asset pipeline, without cleaning.
    pub fn build_assets(&self) -> Result<BuildStats> {
        let _guard = BUILD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        self.transition(BuildState::Building);

        let result = self.load_site().and_then(|site| {
            let assets = self.run_assets(&site, &AtomicBool::new(false))?;
            Ok(BuildStats {
                assets,
                ..BuildStats::default()
            })
        });
        self.finish(result, start)
    }

    /// Load and validate pages and their layouts without writing anything.
    pub fn check(&self) -> Result<Vec<Page>> {
        let pages = self.load_pages()?;
        let templates = TemplateEngine::new(self.templates_dir());
        for page in &pages {
            templates
                .template(&page.layout)
                .map_err(|source| BuildError::Page {
                    path: page.source.clone(),
                    source,
                })?;
        }
        self.resolve_outputs(&pages)?;
        ContentRewriter::from_config(&self.config.rewrite, "")?;
        Ok(pages)
    }

    fn transition(&self, next: BuildState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *state, next);
        info!(from = %previous, to = %next, "build state");
    }

    fn finish(&self, result: Result<BuildStats>, start: Instant) -> Result<BuildStats> {
        match result {
            Ok(mut stats) => {
                stats.duration_ms = start.elapsed().as_millis() as u64;
                self.transition(BuildState::Done);
                Ok(stats)
            }
            Err(e) => {
                error!(error = %e, "build failed");
                self.transition(BuildState::Failed);
                Err(e)
            }
        }
    }

    fn load_site(&self) -> Result<SiteMetadata> {
        Ok(SiteMetadata::load(&self.config, &self.root)?)
    }

    fn load_pages(&self) -> Result<Vec<Page>> {
        let loader = ContentLoader::new(self.pages_dir(), self.config.pages.root_aliases.clone());
        Ok(loader.load_all()?)
    }

    fn remove_output(&self) -> Result<()> {
        let output = self.output_dir();
        match fs::remove_dir_all(&output) {
            Ok(()) => {
                debug!(dir = %output.display(), "removed output directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BuildError::Io {
                path: output,
                source,
            }),
        }
    }

    /// Map every page to its output path, rejecting collisions.
    fn resolve_outputs(&self, pages: &[Page]) -> Result<Vec<PathBuf>> {
        let resolver = OutputPathResolver::new(self.output_dir());
        let mut seen: BTreeMap<PathBuf, &Path> = BTreeMap::new();
        let mut outputs = Vec::with_capacity(pages.len());

        for page in pages {
            let path = resolver.resolve(&page.slug)?;
            if let Some(first) = seen.insert(path.clone(), &page.source) {
                return Err(BuildError::DuplicateOutput {
                    path,
                    first: first.to_path_buf(),
                    second: page.source.clone(),
                });
            }
            outputs.push(path);
        }

        Ok(outputs)
    }

    /// Load, render and write every page. Nothing is written until every page
    /// has rendered, and nothing at all once `cancel` is set.
    fn run_pages(&self, site: &Arc<SiteMetadata>, cancel: &AtomicBool) -> Result<usize> {
        let pages = self.load_pages()?;
        let outputs = self.resolve_outputs(&pages)?;

        let rewriter = ContentRewriter::from_config(&self.config.rewrite, site.version())?;
        let renderer = PageRenderer::new(
            TemplateEngine::new(self.templates_dir()),
            rewriter,
            Arc::clone(site),
        )
        .with_minify(self.config.build.minify_html)
        .with_injection(self.inject.clone());

        info!(count = pages.len(), "rendering pages");
        let rendered = pages
            .par_iter()
            .zip(outputs)
            .map(|(page, output_path)| {
                let html = renderer.render(page).map_err(|source| BuildError::Page {
                    path: page.source.clone(),
                    source,
                })?;
                Ok(RenderedPage { output_path, html })
            })
            .collect::<Result<Vec<_>>>()?;

        rendered.par_iter().try_for_each(|page| {
            if cancel.load(Ordering::Relaxed) {
                return Err(BuildError::Cancelled);
            }
            write_page(page)
        })?;
        Ok(rendered.len())
    }

    fn run_assets(&self, site: &SiteMetadata, cancel: &AtomicBool) -> Result<usize> {
        let scripts =
            ContentRewriter::for_scripts(&self.config.rewrite.version_placeholder, site.version());
        let pipeline = AssetPipeline::new(self.config.assets.clone(), scripts)?;
        let report =
            pipeline.process_until(&self.assets_dir(), &self.assets_output_dir(), cancel)?;
        Ok(report.len())
    }

    fn copy_metadata_files(&self) -> Result<usize> {
        let output = self.output_dir();
        for file in &self.config.paths.metadata_files {
            let from = self.root.join(file);
            let to = output.join(file);
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
            fs::copy(&from, &to).map_err(|e| io_error(&from, e))?;
            debug!(file = %file, "copied metadata file");
        }
        Ok(self.config.paths.metadata_files.len())
    }
}

impl BuildError {
    /// True when the error only reports that sibling work failed first.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Asset(AssetError::Cancelled))
    }
}

/// Raise `cancel` when `result` is an error so sibling work stops early.
fn cancel_on_error<T>(cancel: &AtomicBool, result: Result<T>) -> Result<T> {
    if result.is_err() {
        cancel.store(true, Ordering::Relaxed);
    }
    result
}

fn write_page(page: &RenderedPage) -> Result<()> {
    if let Some(parent) = page.output_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    fs::write(&page.output_path, &page.html).map_err(|e| io_error(&page.output_path, e))?;
    debug!(path = %page.output_path.display(), "wrote page");
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}
