//! Markdown renderer using pulldown-cmark.

use std::collections::HashSet;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};

/// Markdown to HTML renderer.
///
/// Rendering is a pure function of the input text. Fenced code blocks carry a
/// `lang-<info>` class on their `<code>` element, which the content rewriter
/// later maps onto the highlighter's naming.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    /// Create a new markdown renderer with default options.
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self { options }
    }

    /// Render a Markdown body to an HTML fragment.
    pub fn render(&self, markdown: &str) -> String {
        let events = transform_events(Parser::new_ext(markdown, self.options));

        let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}

/// Rewrite code block markup and assign heading ids.
fn transform_events<'a>(parser: Parser<'a>) -> Vec<Event<'a>> {
    let mut events: Vec<Event<'a>> = Vec::new();
    let mut heading: Option<(usize, String)> = None;
    let mut seen_ids: HashSet<String> = HashSet::new();

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let open = match kind {
                    CodeBlockKind::Fenced(info) => {
                        let lang = info.split_whitespace().next().unwrap_or_default();
                        if lang.is_empty() {
                            "<pre><code>".to_string()
                        } else {
                            format!("<pre><code class=\"lang-{}\">", html_escape(lang))
                        }
                    }
                    CodeBlockKind::Indented => "<pre><code>".to_string(),
                };
                events.push(Event::Html(CowStr::from(open)));
            }

            Event::End(TagEnd::CodeBlock) => {
                events.push(Event::Html(CowStr::Borrowed("</code></pre>\n")));
            }

            Event::Start(Tag::Heading { .. }) => {
                heading = Some((events.len(), String::new()));
                events.push(event);
            }

            Event::Text(ref text) | Event::Code(ref text) => {
                if let Some((_, ref mut heading_text)) = heading {
                    heading_text.push_str(text);
                }
                events.push(event);
            }

            Event::End(TagEnd::Heading(_)) => {
                if let Some((start, text)) = heading.take() {
                    if let Event::Start(Tag::Heading { id, .. }) = &mut events[start] {
                        if id.is_none() {
                            let slug = unique_id(slugify(&text), &mut seen_ids);
                            *id = Some(CowStr::from(slug));
                        }
                    }
                }
                events.push(event);
            }

            other => events.push(other),
        }
    }

    events
}

/// Make an id unique within one document by suffixing `-1`, `-2`, ...
fn unique_id(base: String, seen: &mut HashSet<String>) -> String {
    let base = if base.is_empty() {
        "section".to_string()
    } else {
        base
    };

    let mut id = base.clone();
    let mut n = 0;
    while seen.contains(&id) {
        n += 1;
        id = format!("{base}-{n}");
    }
    seen.insert(id.clone());
    id
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Convert text to a URL-safe slug.
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
