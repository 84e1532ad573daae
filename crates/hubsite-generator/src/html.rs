//! Page rendering: Markdown body, layout, rewrites, optional minification.

use std::{path::PathBuf, sync::Arc};

use hubsite_core::{Page, SiteMetadata};
use hubsite_parser::MarkdownRenderer;
use tracing::debug;

use crate::{
    rewrite::ContentRewriter,
    template::{Result, TemplateEngine},
};

/// A rendered page waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Destination file.
    pub output_path: PathBuf,

    /// Final bytes.
    pub html: Vec<u8>,
}

/// Renders pages to their final HTML.
#[derive(Debug)]
pub struct PageRenderer {
    markdown: MarkdownRenderer,
    templates: TemplateEngine,
    rewriter: ContentRewriter,
    site: Arc<SiteMetadata>,
    minify: bool,
    inject: Option<String>,
}

impl PageRenderer {
    /// Create a renderer for one build.
    pub fn new(templates: TemplateEngine, rewriter: ContentRewriter, site: Arc<SiteMetadata>) -> Self {
        Self {
            markdown: MarkdownRenderer::new(),
            templates,
            rewriter,
            site,
            minify: false,
            inject: None,
        }
    }

    /// Minify the final HTML.
    #[must_use]
    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    /// Insert `snippet` before `</body>` of every page.
    #[must_use]
    pub fn with_injection(mut self, snippet: Option<String>) -> Self {
        self.inject = snippet;
        self
    }

    /// Template engine used by this renderer.
    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    /// Render a page to bytes.
    pub fn render(&self, page: &Page) -> Result<Vec<u8>> {
        let body = self.markdown.render(&page.raw_body);
        let html = self
            .templates
            .render_page(&page.layout, &self.site, &page.metadata, &body)?;
        let html = self.rewriter.rewrite(&html);

        let mut bytes = if self.minify {
            minify_html::minify(html.as_bytes(), &minify_config())
        } else {
            html.into_bytes()
        };

        if let Some(snippet) = &self.inject {
            bytes = inject_before_body_end(&bytes, snippet.as_bytes());
        }

        debug!(slug = %page.slug, bytes = bytes.len(), "rendered page");
        Ok(bytes)
    }
}

fn minify_config() -> minify_html::Cfg {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    // Inline scripts are left as written.
    cfg.minify_js = false;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    cfg
}

/// Insert `snippet` before the last `</body>`, or append it when there is none.
pub fn inject_before_body_end(html: &[u8], snippet: &[u8]) -> Vec<u8> {
    let needle = b"</body>";
    let position = html
        .windows(needle.len())
        .rposition(|w| w.eq_ignore_ascii_case(needle))
        .unwrap_or(html.len());

    let mut out = Vec::with_capacity(html.len() + snippet.len());
    out.extend_from_slice(&html[..position]);
    out.extend_from_slice(snippet);
    out.extend_from_slice(&html[position..]);
    out
}
