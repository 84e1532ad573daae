//! Hubsite Generator Library
//!
//! Static site generation engine for hubsite.
//!
//! # Modules
//!
//! - [`loader`] - Page discovery and loading
//! - [`template`] - Layout templates with variable interpolation
//! - [`rewrite`] - Ordered text substitutions over rendered output
//! - [`output`] - Pretty-URL output paths
//! - [`html`] - Page rendering
//! - [`assets`] - Static asset pipeline
//! - [`build`] - Build orchestration

pub mod assets;
pub mod build;
pub mod html;
pub mod images;
pub mod loader;
pub mod output;
pub mod rewrite;
pub mod scripts;
pub mod styles;
pub mod template;

pub use assets::{AssetError, AssetPipeline, AssetReport, TransformStage};
pub use build::{BuildError, BuildState, BuildStats, Builder};
pub use html::{PageRenderer, RenderedPage};
pub use loader::ContentLoader;
pub use output::{OutputPathResolver, PathError};
pub use rewrite::{ContentRewriter, Rule};
pub use template::{Template, TemplateContext, TemplateEngine, TemplateError};
