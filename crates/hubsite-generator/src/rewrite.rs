//! Text substitutions applied to rendered pages and scripts.

use hubsite_core::config::RewriteConfig;
use regex::Regex;
use thiserror::Error;

/// Errors building a rewriter from configuration.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// A configured regex rule failed to compile.
    #[error("invalid rewrite pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One substitution rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Replace every occurrence of a literal string.
    Literal { find: String, replace: String },

    /// Replace every match of a regex; `$1` style captures are expanded.
    Regex { pattern: Regex, replace: String },
}

impl Rule {
    /// Create a literal rule.
    pub fn literal(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self::Literal {
            find: find.into(),
            replace: replace.into(),
        }
    }

    /// Create a regex rule.
    pub fn regex(pattern: &str, replace: impl Into<String>) -> Result<Self, RewriteError> {
        let pattern = Regex::new(pattern).map_err(|source| RewriteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self::Regex {
            pattern,
            replace: replace.into(),
        })
    }

    fn apply(&self, text: String) -> String {
        match self {
            Self::Literal { find, replace } => {
                if find.is_empty() || !text.contains(find.as_str()) {
                    text
                } else {
                    text.replace(find.as_str(), replace)
                }
            }
            Self::Regex { pattern, replace } => {
                match pattern.replace_all(&text, replace.as_str()) {
                    std::borrow::Cow::Borrowed(_) => text,
                    std::borrow::Cow::Owned(replaced) => replaced,
                }
            }
        }
    }
}

/// An ordered list of rules, applied first to last.
#[derive(Debug, Clone, Default)]
pub struct ContentRewriter {
    rules: Vec<Rule>,
}

impl ContentRewriter {
    /// Create an empty rewriter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Built-in page rules: version substitution, then the code class renames.
    ///
    /// The second rename only matches after the first has run.
    pub fn for_pages(placeholder: &str, version: &str) -> Self {
        Self::for_scripts(placeholder, version)
            .with_rule(Rule::literal(r#"class="lang-"#, r#"class="language-"#))
            .with_rule(Rule::literal(
                r#"class="language-html"#,
                r#"class="language-markup"#,
            ))
    }

    /// Built-in script rules: version substitution only.
    pub fn for_scripts(placeholder: &str, version: &str) -> Self {
        Self::new().with_rule(Rule::literal(placeholder, version))
    }

    /// Page rewriter with the configured extra rules appended.
    pub fn from_config(config: &RewriteConfig, version: &str) -> Result<Self, RewriteError> {
        let mut rewriter = Self::for_pages(&config.version_placeholder, version);
        for rule in &config.rules {
            let rule = if rule.regex {
                Rule::regex(&rule.find, rule.replace.as_str())?
            } else {
                Rule::literal(rule.find.as_str(), rule.replace.as_str())
            };
            rewriter.rules.push(rule);
        }
        Ok(rewriter)
    }

    /// Apply all rules in order.
    pub fn rewrite(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, rule| rule.apply(acc))
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the rewriter has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
