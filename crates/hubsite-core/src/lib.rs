//! Hubsite Core Library
//!
//! Core types, configuration, and error handling for the hubsite static site generator.

pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod frontmatter;

pub use config::Config;
pub use content::{Asset, AssetKind, Page, SiteMetadata};
pub use error::{CoreError, Result};
pub use frontmatter::Metadata;
