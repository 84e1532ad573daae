//! Serve command - development server with live reload
//!
//! File events flow through an mpsc queue. A single consumer task collects
//! them until the queue has been quiet for the debounce interval, merges them
//! into one [`RebuildRequest`] and runs it on a blocking thread before taking
//! the next batch, so rebuilds never overlap.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use color_eyre::eyre::{Result, WrapErr};
use hubsite_core::{AssetKind, Config};
use hubsite_generator::{BuildStats, Builder};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind};
use tokio::{net::TcpListener, sync::mpsc};

use super::{build::Target, load_config};
use crate::server::{LIVERELOAD_SCRIPT, ReloadMessage, ServerState, create_router};

/// Capacity of the file event queue.
const EVENT_QUEUE: usize = 256;

/// What a changed file affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A page source or layout template.
    Pages,
    /// A stylesheet under the assets directory.
    Style,
    /// Any other asset.
    Asset,
    /// Outside the watched inputs, or an editor temp file.
    Ignored,
}

/// Watched input directories.
#[derive(Debug, Clone)]
pub struct WatchedDirs {
    pages: PathBuf,
    templates: PathBuf,
    assets: PathBuf,
}

impl WatchedDirs {
    /// Input directories of a builder.
    pub fn from_builder(builder: &Builder) -> Self {
        Self {
            pages: builder.pages_dir(),
            templates: builder.templates_dir(),
            assets: builder.assets_dir(),
        }
    }

    /// Classify a changed path.
    pub fn classify(&self, path: &Path) -> Change {
        let is_temp = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_none_or(|n| n.starts_with('.') || n.ends_with('~'));
        if is_temp {
            return Change::Ignored;
        }

        if path.starts_with(&self.pages) || path.starts_with(&self.templates) {
            Change::Pages
        } else if path.starts_with(&self.assets) {
            match AssetKind::from_path(path) {
                AssetKind::Style => Change::Style,
                _ => Change::Asset,
            }
        } else {
            Change::Ignored
        }
    }

    fn existing(&self) -> impl Iterator<Item = &Path> {
        [&self.pages, &self.templates, &self.assets]
            .into_iter()
            .map(PathBuf::as_path)
            .filter(|dir| dir.is_dir())
    }
}

/// A batch of changes merged into the pipelines they affect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildRequest {
    pages: bool,
    assets: bool,
    only_styles: bool,
}

impl RebuildRequest {
    /// Merge one change into the request.
    pub fn add(&mut self, change: Change) {
        match change {
            Change::Pages => self.pages = true,
            Change::Style => {
                if !self.assets {
                    self.only_styles = true;
                }
                self.assets = true;
            }
            Change::Asset => {
                self.assets = true;
                self.only_styles = false;
            }
            Change::Ignored => {}
        }
    }

    /// Pipelines to run, if any.
    pub fn target(&self) -> Option<Target> {
        match (self.pages, self.assets) {
            (true, true) => Some(Target::All),
            (true, false) => Some(Target::Pages),
            (false, true) => Some(Target::Assets),
            (false, false) => None,
        }
    }

    /// What connected browsers should do afterwards.
    pub fn reload(&self) -> ReloadMessage {
        if !self.pages && self.only_styles {
            ReloadMessage::CssReload
        } else {
            ReloadMessage::Reload
        }
    }
}

/// Run the serve command.
pub async fn run(
    root: &Path,
    config_path: &Path,
    port: Option<u16>,
    host: Option<String>,
    open_browser: bool,
) -> Result<()> {
    let root = root
        .canonicalize()
        .wrap_err_with(|| format!("Project root {} not found", root.display()))?;
    let config = load_config(&root, config_path)?;

    let host = host.unwrap_or_else(|| config.serve.host.clone());
    let port = port.unwrap_or(config.serve.port);
    let debounce = Duration::from_millis(config.serve.debounce_ms);
    tracing::info!(?root, %host, port, ?debounce, "Starting serve mode");

    let builder = Arc::new(serve_builder(config, &root));
    let output_dir = builder.output_dir();

    tracing::info!("Running initial build...");
    let initial = Arc::clone(&builder);
    let stats = tokio::task::spawn_blocking(move || initial.build())
        .await
        .wrap_err("Initial build panicked")?
        .wrap_err("Initial build failed")?;
    print_build_stats(&stats);

    let state = Arc::new(ServerState::new());

    let (tx, rx) = mpsc::channel::<PathBuf>(EVENT_QUEUE);
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if is_content_event(&event.kind) {
                    for path in event.paths {
                        let _ = tx.blocking_send(path);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "file watcher error"),
        },
        notify::Config::default(),
    )
    .wrap_err("Failed to create file watcher")?;

    let dirs = WatchedDirs::from_builder(&builder);
    for dir in dirs.existing() {
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .wrap_err_with(|| format!("Failed to watch {}", dir.display()))?;
        tracing::debug!(dir = %dir.display(), "watching");
    }

    tokio::spawn(rebuild_loop(
        rx,
        dirs,
        Arc::clone(&builder),
        Arc::clone(&state),
        debounce,
    ));

    let app = create_router(&output_dir, state);
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {addr}"))?;

    println!();
    println!("  Dev server running at http://{addr}");
    println!("  Press Ctrl+C to stop");
    println!();

    if open_browser {
        if let Err(e) = open::that(format!("http://{addr}")) {
            tracing::warn!(error = %e, "failed to open browser");
        }
    }

    // Keep watcher alive
    let _watcher = watcher;

    axum::serve(listener, app).await.wrap_err("Server error")?;

    Ok(())
}

/// Builder used in serve mode: pages carry the live reload script.
pub fn serve_builder(config: Config, root: &Path) -> Builder {
    Builder::new(config, root).with_injection(LIVERELOAD_SCRIPT)
}

fn is_content_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any)
            | EventKind::Create(_)
            | EventKind::Remove(_)
    )
}

/// Collect events until the queue is quiet for `debounce`, merged into one
/// request. Returns `None` once the queue is closed and drained.
pub async fn next_batch(
    rx: &mut mpsc::Receiver<PathBuf>,
    dirs: &WatchedDirs,
    debounce: Duration,
) -> Option<RebuildRequest> {
    let first = rx.recv().await?;
    let mut request = RebuildRequest::default();
    request.add(dirs.classify(&first));

    while let Ok(Some(path)) = tokio::time::timeout(debounce, rx.recv()).await {
        request.add(dirs.classify(&path));
    }

    Some(request)
}

async fn rebuild_loop(
    mut rx: mpsc::Receiver<PathBuf>,
    dirs: WatchedDirs,
    builder: Arc<Builder>,
    state: Arc<ServerState>,
    debounce: Duration,
) {
    while let Some(request) = next_batch(&mut rx, &dirs, debounce).await {
        let Some(target) = request.target() else {
            continue;
        };

        println!();
        println!("  File change detected, rebuilding ({target:?})...");

        let worker = Arc::clone(&builder);
        let outcome =
            tokio::task::spawn_blocking(move || super::build::run_target(&worker, target)).await;

        match outcome {
            Ok(Ok(stats)) => {
                println!(
                    "  ✓ Rebuilt {} pages, {} assets in {}ms",
                    stats.pages, stats.assets, stats.duration_ms
                );
                state.notify(request.reload());
            }
            Ok(Err(e)) => {
                tracing::error!("Rebuild failed: {e:#}");
                eprintln!("  ✗ Rebuild failed: {e:#}");
            }
            Err(e) => tracing::error!(error = %e, "rebuild task panicked"),
        }
    }
}

/// Print build statistics in a user-friendly format.
fn print_build_stats(stats: &BuildStats) {
    println!();
    println!("  Build Statistics:");
    println!("  ─────────────────────────────────");
    println!("  Pages:        {:>6}", stats.pages);
    println!("  Assets:       {:>6}", stats.assets);
    println!("  Metadata:     {:>6}", stats.metadata_files);
    println!("  ─────────────────────────────────");
    println!("  Duration:     {:>6}ms", stats.duration_ms);
    println!();
}
