//! Layout templates.
//!
//! A lightweight interpolation system rather than a full template language:
//! `{{ name }}` inserts a variable, `{{ name? }}` inserts it or nothing. Page
//! layouts see three namespaces: `site.*`, `page.*` and `content`.

use std::{
    collections::HashMap,
    fs,
    path::{Component, Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use hubsite_core::{Metadata, SiteMetadata};
use thiserror::Error;
use tracing::debug;

/// File extension of layout templates.
pub const TEMPLATE_EXTENSION: &str = "html";

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Layout has no template file.
    #[error("template not found for layout `{layout}` (looked for {path})")]
    NotFound { layout: String, path: PathBuf },

    /// Missing required variable.
    #[error("missing required variable `{name}` in template `{template}`")]
    MissingVariable { template: String, name: String },

    /// Invalid template syntax.
    #[error("invalid template syntax in `{template}`: {message}")]
    InvalidSyntax { template: String, message: String },

    /// Template file could not be read.
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Template context with variables for interpolation.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    variables: HashMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context of a page render: `site.*`, `page.*` and `content`.
    pub fn for_page(site: &SiteMetadata, page: &Metadata, content: &str) -> Self {
        let mut ctx = Self::new();
        for (key, value) in site.iter() {
            ctx.insert(format!("site.{key}"), value);
        }
        for (key, value) in page {
            ctx.insert(format!("page.{key}"), value.as_str());
        }
        ctx.insert("content", content);
        ctx
    }

    /// Insert a variable into the context.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Create context with initial variables.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a variable value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// Check if a variable exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable { name: String, optional: bool },
}

/// A compiled template: literal text interleaved with variable slots.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compile template source.
    pub fn compile(name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| TemplateError::InvalidSyntax {
                template: name.clone(),
                message: "unclosed {{ delimiter".to_string(),
            })?;

            let expr = after[..end].trim();
            let (var_name, optional) = match expr.strip_suffix('?') {
                Some(stripped) => (stripped.trim_end(), true),
                None => (expr, false),
            };
            if var_name.is_empty() {
                return Err(TemplateError::InvalidSyntax {
                    template: name,
                    message: "empty {{ }} expression".to_string(),
                });
            }

            segments.push(Segment::Variable {
                name: var_name.to_string(),
                optional,
            });
            rest = &after[end + 2..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { name, segments })
    }

    /// Get the template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the template with the given context.
    pub fn render(&self, context: &TemplateContext) -> Result<String> {
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable { name, optional } => match context.get(name) {
                    Some(value) => out.push_str(value),
                    None if *optional => {}
                    None => {
                        return Err(TemplateError::MissingVariable {
                            template: self.name.clone(),
                            name: name.clone(),
                        });
                    }
                },
            }
        }

        Ok(out)
    }
}

/// Resolves layout names to templates under a directory.
///
/// Compiled templates are cached by layout name for the lifetime of the
/// engine; create one engine per build so edits are picked up by the next
/// build.
#[derive(Debug)]
pub struct TemplateEngine {
    templates_dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<Template>>>,
}

impl TemplateEngine {
    /// Create an engine reading `<layout>.html` files from `templates_dir`.
    #[must_use]
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Path of the template file for a layout.
    pub fn template_path(&self, layout: &str) -> PathBuf {
        self.templates_dir
            .join(format!("{layout}.{TEMPLATE_EXTENSION}"))
    }

    /// Get the compiled template for a layout, loading it on first use.
    pub fn template(&self, layout: &str) -> Result<Arc<Template>> {
        if let Some(template) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(layout)
        {
            return Ok(Arc::clone(template));
        }

        let path = self.template_path(layout);
        if !is_plain_name(layout) || !path.is_file() {
            return Err(TemplateError::NotFound {
                layout: layout.to_string(),
                path,
            });
        }

        let source = fs::read_to_string(&path).map_err(|source| TemplateError::Io {
            path: path.clone(),
            source,
        })?;
        let template = Arc::new(Template::compile(layout, &source)?);
        debug!(layout, path = %path.display(), "compiled template");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            cache.entry(layout.to_string()).or_insert(template),
        ))
    }

    /// Render a layout with the given context.
    pub fn render(&self, layout: &str, context: &TemplateContext) -> Result<String> {
        self.template(layout)?.render(context)
    }

    /// Render a page body into its layout.
    pub fn render_page(
        &self,
        layout: &str,
        site: &SiteMetadata,
        page: &Metadata,
        content: &str,
    ) -> Result<String> {
        let context = TemplateContext::for_page(site, page, content);
        self.render(layout, &context)
    }

    /// Number of compiled templates held by the engine.
    pub fn cached(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Layout names are single path components: no separators, no `..`.
fn is_plain_name(layout: &str) -> bool {
    let mut components = Path::new(layout).components();
    matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !layout.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;

    fn site() -> SiteMetadata {
        let mut vars = BTreeMap::new();
        vars.insert("version".to_string(), "1.4.0".to_string());
        vars.insert("title".to_string(), "HoleHub".to_string());
        SiteMetadata::new(vars)
    }

    fn engine_with(templates: &[(&str, &str)]) -> (TempDir, TemplateEngine) {
        let dir = TempDir::new().unwrap();
        for (name, source) in templates {
            fs::write(dir.path().join(format!("{name}.html")), source).unwrap();
        }
        let engine = TemplateEngine::new(dir.path());
        (dir, engine)
    }

    #[test]
    fn test_template_simple_render() {
        let template = Template::compile("test", "Hello, {{ name }}!").unwrap();
        let ctx = TemplateContext::new().with_var("name", "World");

        assert_eq!(template.render(&ctx).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_template_without_spaces() {
        let template = Template::compile("test", "<main>{{content}}</main>").unwrap();
        let ctx = TemplateContext::new().with_var("content", "<p>x</p>");

        assert_eq!(template.render(&ctx).unwrap(), "<main><p>x</p></main>");
    }

    #[test]
    fn test_template_optional_variable() {
        let template = Template::compile("test", "Hello{{ suffix? }}!").unwrap();

        assert_eq!(template.render(&TemplateContext::new()).unwrap(), "Hello!");

        let ctx = TemplateContext::new().with_var("suffix", ", World");
        assert_eq!(template.render(&ctx).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_template_missing_required_variable() {
        let template = Template::compile("test", "Hello, {{ name }}!").unwrap();
        let result = template.render(&TemplateContext::new());

        assert!(matches!(result, Err(TemplateError::MissingVariable { .. })));
    }

    #[test]
    fn test_template_unclosed_delimiter() {
        let result = Template::compile("broken", "Hello {{ name");
        assert!(matches!(result, Err(TemplateError::InvalidSyntax { .. })));
    }

    #[test]
    fn test_template_empty_expression() {
        let result = Template::compile("broken", "Hello {{ }}");
        assert!(matches!(result, Err(TemplateError::InvalidSyntax { .. })));
    }

    #[test]
    fn test_values_are_not_reinterpreted() {
        let template = Template::compile("test", "{{ a }}").unwrap();
        let ctx = TemplateContext::new().with_var("a", "{{ b }}");
        assert_eq!(template.render(&ctx).unwrap(), "{{ b }}");
    }

    #[test]
    fn test_page_namespaces() {
        let mut page = Metadata::new();
        page.insert("title".to_string(), "Pricing".to_string());
        page.insert("layout".to_string(), "default".to_string());

        let template = Template::compile(
            "default",
            "<title>{{ page.title }} | {{ site.title }}</title>v{{ site.version }}{{ content }}",
        )
        .unwrap();
        let ctx = TemplateContext::for_page(&site(), &page, "<p>body</p>");

        assert_eq!(
            template.render(&ctx).unwrap(),
            "<title>Pricing | HoleHub</title>v1.4.0<p>body</p>"
        );
    }

    #[test]
    fn test_engine_renders_layout_file() {
        let (_dir, engine) = engine_with(&[("default", "<body>{{ content }}</body>")]);
        let html = engine
            .render_page("default", &site(), &Metadata::new(), "<h1>Hi</h1>")
            .unwrap();
        assert_eq!(html, "<body><h1>Hi</h1></body>");
    }

    #[test]
    fn test_engine_template_not_found() {
        let (_dir, engine) = engine_with(&[]);
        let result = engine.template("missing");
        assert!(matches!(result, Err(TemplateError::NotFound { .. })));
    }

    #[test]
    fn test_engine_rejects_path_like_layouts() {
        let (dir, engine) = engine_with(&[("default", "x")]);
        fs::write(dir.path().join("secret.html"), "s").unwrap();

        for layout in ["../default", "a/default", "..", ""] {
            assert!(
                matches!(engine.template(layout), Err(TemplateError::NotFound { .. })),
                "{layout:?} should not resolve"
            );
        }
    }

    #[test]
    fn test_engine_caches_compiled_templates() {
        let (dir, engine) = engine_with(&[("default", "first {{ content }}")]);

        let first = engine.render("default", &TemplateContext::new().with_var("content", "a"));
        assert_eq!(first.unwrap(), "first a");

        // The file changes on disk, the engine keeps its compiled copy.
        fs::write(dir.path().join("default.html"), "second {{ content }}").unwrap();
        let again = engine.render("default", &TemplateContext::new().with_var("content", "b"));
        assert_eq!(again.unwrap(), "first b");
        assert_eq!(engine.cached(), 1);

        // A fresh engine (next build) sees the edit.
        let next = TemplateEngine::new(dir.path());
        let fresh = next.render("default", &TemplateContext::new().with_var("content", "c"));
        assert_eq!(fresh.unwrap(), "second c");
    }
}
