//! Hubsite Parser Library
//!
//! Markdown rendering for page bodies.

pub mod markdown;

pub use markdown::MarkdownRenderer;
