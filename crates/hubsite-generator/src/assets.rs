//! Static asset pipeline.
//!
//! Discovers every file under the assets directory and writes it to the
//! assets output directory, applying the transform for its [`AssetKind`].

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use hubsite_core::{Asset, AssetKind, config::AssetsConfig};
use lightningcss::targets::Browsers;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{
    images::{ImageType, optimize_image},
    rewrite::ContentRewriter,
    scripts::{ScriptMode, minify_script},
    styles::{StyleOptions, browser_targets, process_style},
};

/// Asset processing errors.
#[derive(Debug, Error)]
pub enum AssetError {
    /// IO error.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A transform rejected its input.
    #[error("{stage} failed for {path}: {message}")]
    Transform {
        path: PathBuf,
        stage: TransformStage,
        message: String,
    },

    /// The browser matrix could not be resolved.
    #[error("invalid browser query: {0}")]
    Browsers(String),

    /// Invalid asset path.
    #[error("invalid asset path: {0}")]
    InvalidPath(PathBuf),

    /// Stopped because another part of the build failed.
    #[error("asset processing cancelled")]
    Cancelled,
}

/// Result type for asset operations.
pub type Result<T> = std::result::Result<T, AssetError>;

/// Which transform failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStage {
    ScriptMinify,
    StylePrefix,
    ImageOptimize,
}

impl fmt::Display for TransformStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ScriptMinify => "script minification",
            Self::StylePrefix => "style processing",
            Self::ImageOptimize => "image optimization",
        };
        f.write_str(name)
    }
}

/// Outcome of processing one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedAsset {
    /// Path relative to the assets directory.
    pub relative_path: PathBuf,

    /// Asset category.
    pub kind: AssetKind,

    /// Source size in bytes.
    pub source_bytes: u64,

    /// Written size in bytes.
    pub output_bytes: u64,
}

/// Summary of an asset pipeline run, ordered by relative path.
#[derive(Debug, Clone, Default)]
pub struct AssetReport {
    assets: Vec<ProcessedAsset>,
}

impl AssetReport {
    /// Processed assets.
    #[must_use]
    pub fn assets(&self) -> &[ProcessedAsset] {
        &self.assets
    }

    /// Number of assets written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether no asset was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Bytes saved across all transforms.
    #[must_use]
    pub fn saved_bytes(&self) -> u64 {
        self.assets
            .iter()
            .map(|a| a.source_bytes.saturating_sub(a.output_bytes))
            .sum()
    }
}

/// Copies and transforms static assets.
#[derive(Debug)]
pub struct AssetPipeline {
    settings: AssetsConfig,
    browsers: Option<Browsers>,
    scripts: ContentRewriter,
}

impl AssetPipeline {
    /// Create a pipeline. `scripts` is the rewriter applied to scripts
    /// before minification.
    pub fn new(settings: AssetsConfig, scripts: ContentRewriter) -> Result<Self> {
        let browsers = if settings.prefix_styles {
            browser_targets(&settings.browsers).map_err(AssetError::Browsers)?
        } else {
            None
        };

        Ok(Self {
            settings,
            browsers,
            scripts,
        })
    }

    /// Discover assets under `source_dir`, sorted by relative path. Hidden
    /// files and directories are skipped; a missing directory yields none.
    pub fn discover(&self, source_dir: &Path) -> Result<Vec<Asset>> {
        if !source_dir.is_dir() {
            debug!(dir = %source_dir.display(), "assets directory does not exist, skipping");
            return Ok(Vec::new());
        }

        let mut assets = Vec::new();
        let walker = WalkDir::new(source_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = entry.map_err(|e| AssetError::Io {
                path: e.path().map_or_else(|| source_dir.to_path_buf(), Path::to_path_buf),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(source_dir)
                .map_err(|_| AssetError::InvalidPath(entry.path().to_path_buf()))?;
            assets.push(Asset::new(entry.path(), relative));
        }

        Ok(assets)
    }

    /// Process every asset from `source_dir` into `dest_dir`.
    pub fn process(&self, source_dir: &Path, dest_dir: &Path) -> Result<AssetReport> {
        self.process_until(source_dir, dest_dir, &AtomicBool::new(false))
    }

    /// Like [`process`](Self::process), sharing `cancel` with sibling work.
    ///
    /// An asset failure sets `cancel`; once it is set, assets not yet started
    /// are skipped and the call returns [`AssetError::Cancelled`] unless an
    /// asset failed on its own.
    pub fn process_until(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        cancel: &AtomicBool,
    ) -> Result<AssetReport> {
        info!(
            source = %source_dir.display(),
            dest = %dest_dir.display(),
            "processing assets"
        );

        let assets = self.discover(source_dir)?;
        let processed = assets
            .par_iter()
            .map(|asset| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(AssetError::Cancelled);
                }
                let result = self.process_asset(asset, dest_dir);
                if result.is_err() {
                    cancel.store(true, Ordering::Relaxed);
                }
                result
            })
            .collect::<Vec<_>>();
        let processed = first_failure(processed)?;

        let report = AssetReport { assets: processed };
        info!(
            count = report.len(),
            saved_bytes = report.saved_bytes(),
            "assets processed"
        );
        Ok(report)
    }

    /// Transform and write a single asset.
    pub fn process_asset(&self, asset: &Asset, dest_dir: &Path) -> Result<ProcessedAsset> {
        let source = &asset.source_path;
        let bytes = fs::read(source).map_err(|e| io_error(source, e))?;
        let output = self.transform(asset, &bytes)?;

        let dest = dest_dir.join(&asset.relative_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        fs::write(&dest, &output).map_err(|e| io_error(&dest, e))?;

        debug!(
            asset = %asset.relative_path.display(),
            kind = ?asset.kind,
            from = bytes.len(),
            to = output.len(),
            "wrote asset"
        );

        Ok(ProcessedAsset {
            relative_path: asset.relative_path.clone(),
            kind: asset.kind,
            source_bytes: bytes.len() as u64,
            output_bytes: output.len() as u64,
        })
    }

    /// Apply the transform for the asset's kind to its bytes.
    pub fn transform(&self, asset: &Asset, bytes: &[u8]) -> Result<Vec<u8>> {
        let fail = |stage, message: String| AssetError::Transform {
            path: asset.source_path.clone(),
            stage,
            message,
        };

        match asset.kind {
            AssetKind::Script => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| fail(TransformStage::ScriptMinify, e.to_string()))?;
                let text = self.scripts.rewrite(text);
                if self.settings.minify_scripts {
                    minify_script(&text, ScriptMode::from_path(&asset.source_path))
                        .map(String::into_bytes)
                        .map_err(|m| fail(TransformStage::ScriptMinify, m))
                } else {
                    Ok(text.into_bytes())
                }
            }
            AssetKind::Style => {
                if !self.settings.prefix_styles && !self.settings.minify_styles {
                    return Ok(bytes.to_vec());
                }
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| fail(TransformStage::StylePrefix, e.to_string()))?;
                let options = StyleOptions {
                    browsers: self.browsers,
                    prefix: self.settings.prefix_styles,
                    minify: self.settings.minify_styles,
                };
                let filename = asset.relative_path.to_string_lossy();
                process_style(&filename, text, options)
                    .map(String::into_bytes)
                    .map_err(|m| fail(TransformStage::StylePrefix, m))
            }
            AssetKind::Image => match ImageType::from_path(&asset.source_path) {
                Some(kind) if self.settings.optimize_images => {
                    optimize_image(kind, bytes, self.settings.jpeg_quality)
                        .map_err(|m| fail(TransformStage::ImageOptimize, m))
                }
                _ => Ok(bytes.to_vec()),
            },
            AssetKind::Other => Ok(bytes.to_vec()),
        }
    }
}

/// Collect per-asset results, preferring a real failure over `Cancelled`.
fn first_failure(results: Vec<Result<ProcessedAsset>>) -> Result<Vec<ProcessedAsset>> {
    let mut processed = Vec::with_capacity(results.len());
    let mut cancelled = false;
    for result in results {
        match result {
            Ok(asset) => processed.push(asset),
            Err(AssetError::Cancelled) => cancelled = true,
            Err(e) => return Err(e),
        }
    }

    if cancelled {
        return Err(AssetError::Cancelled);
    }
    Ok(processed)
}

fn io_error(path: &Path, source: std::io::Error) -> AssetError {
    AssetError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn pipeline(settings: AssetsConfig) -> AssetPipeline {
        AssetPipeline::new(settings, ContentRewriter::for_scripts("$$version$$", "3.1.0")).unwrap()
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_sorted_and_skips_hidden() {
        let src = TempDir::new().unwrap();
        write(src.path(), "js/app.js", b"var a;");
        write(src.path(), "css/site.css", b"a{}");
        write(src.path(), ".DS_Store", b"junk");
        write(src.path(), ".cache/x.js", b"var b;");
        write(src.path(), "fonts/a.woff2", b"\0\0");

        let assets = pipeline(AssetsConfig::default()).discover(src.path()).unwrap();
        let rel: Vec<_> = assets.iter().map(|a| a.relative_path.clone()).collect();

        assert_eq!(
            rel,
            vec![
                PathBuf::from("css/site.css"),
                PathBuf::from("fonts/a.woff2"),
                PathBuf::from("js/app.js"),
            ]
        );
        assert_eq!(assets[0].kind, AssetKind::Style);
        assert_eq!(assets[1].kind, AssetKind::Other);
        assert_eq!(assets[2].kind, AssetKind::Script);
    }

    #[test]
    fn test_missing_source_dir() {
        let dest = TempDir::new().unwrap();
        let report = pipeline(AssetsConfig::default())
            .process(&dest.path().join("missing"), dest.path())
            .unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_script_version_and_license() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(
            src.path(),
            "js/app.js",
            b"/*! app | MIT */\n/* internal */\nvar version = \"$$version$$\";\nconsole.log(version);\n",
        );

        pipeline(AssetsConfig::default())
            .process(src.path(), dest.path())
            .unwrap();
        let out = fs::read_to_string(dest.path().join("js/app.js")).unwrap();

        assert!(out.starts_with("/*! app | MIT */"));
        assert!(out.contains("3.1.0"));
        assert!(!out.contains("$$version$$"));
        assert!(!out.contains("internal"));
    }

    #[test]
    fn test_script_minify_disabled_still_substitutes() {
        let settings = AssetsConfig {
            minify_scripts: false,
            ..AssetsConfig::default()
        };
        let asset = Asset::new("app.js", "app.js");
        let out = pipeline(settings)
            .transform(&asset, b"var v = '$$version$$'; // keep\n")
            .unwrap();
        assert_eq!(out, b"var v = '3.1.0'; // keep\n");
    }

    #[test]
    fn test_invalid_script_is_fatal() {
        let asset = Asset::new("broken.js", "broken.js");
        let err = pipeline(AssetsConfig::default())
            .transform(&asset, b"function (")
            .unwrap_err();
        assert!(matches!(
            err,
            AssetError::Transform {
                stage: TransformStage::ScriptMinify,
                ..
            }
        ));
    }

    #[test]
    fn test_style_prefixed_and_minified() {
        let asset = Asset::new("site.css", "site.css");
        let out = pipeline(AssetsConfig::default())
            .transform(&asset, b".x {\n  user-select: none;\n}\n")
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("-webkit-user-select"), "{out}");
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_style_passthrough_when_disabled() {
        let settings = AssetsConfig {
            prefix_styles: false,
            minify_styles: false,
            ..AssetsConfig::default()
        };
        let asset = Asset::new("site.css", "site.css");
        let css = b"a {\n  color: red;\n}\n";
        assert_eq!(pipeline(settings).transform(&asset, css).unwrap(), css.to_vec());
    }

    #[test]
    fn test_other_copied_verbatim() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(src.path(), "robots.txt", b"User-agent: *\n");
        write(src.path(), "img/anim.gif", b"GIF89a");

        let report = pipeline(AssetsConfig::default())
            .process(src.path(), dest.path())
            .unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.saved_bytes(), 0);
        assert_eq!(fs::read(dest.path().join("robots.txt")).unwrap(), b"User-agent: *\n");
        assert_eq!(fs::read(dest.path().join("img/anim.gif")).unwrap(), b"GIF89a");
    }

    #[test]
    fn test_cancelled_pipeline_writes_nothing() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        for i in 0..20 {
            write(src.path(), &format!("docs/{i}.txt"), b"x");
        }

        let cancel = AtomicBool::new(true);
        let err = pipeline(AssetsConfig::default())
            .process_until(src.path(), dest.path(), &cancel)
            .unwrap_err();

        assert!(matches!(err, AssetError::Cancelled));
        assert!(!dest.path().join("docs").exists());
    }

    #[test]
    fn test_asset_failure_raises_cancel_and_wins() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(src.path(), "js/broken.js", b"function (");
        for i in 0..20 {
            write(src.path(), &format!("docs/{i}.txt"), b"x");
        }

        let cancel = AtomicBool::new(false);
        let err = pipeline(AssetsConfig::default())
            .process_until(src.path(), dest.path(), &cancel)
            .unwrap_err();

        assert!(cancel.load(Ordering::Relaxed));
        assert!(matches!(err, AssetError::Transform { .. }), "{err}");
    }

    #[test]
    fn test_module_script_is_minified() {
        let asset = Asset::new("js/app.mjs", "js/app.mjs");
        let out = pipeline(AssetsConfig::default())
            .transform(
                &asset,
                b"import { a } from './a.js';\nexport const v = '$$version$$' + a;\n",
            )
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("export"), "{out}");
        assert!(out.contains("3.1.0"), "{out}");
    }

    #[test]
    fn test_invalid_browser_query() {
        let settings = AssetsConfig {
            browsers: vec!["nonsense >= 1".to_string()],
            ..AssetsConfig::default()
        };
        let result = AssetPipeline::new(settings, ContentRewriter::new());
        assert!(matches!(result, Err(AssetError::Browsers(_))));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(TransformStage::StylePrefix.to_string(), "style processing");
    }
}
