//! CSS vendor prefixing and minification via lightningcss.

use lightningcss::{
    stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet},
    targets::{Browsers, Targets},
};

/// Resolve browserslist queries into lightningcss browser targets.
pub fn browser_targets(queries: &[String]) -> Result<Option<Browsers>, String> {
    if queries.is_empty() {
        return Ok(None);
    }
    Browsers::from_browserslist(queries.iter().map(String::as_str)).map_err(|e| e.to_string())
}

/// Options for one stylesheet pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleOptions {
    /// Targets for prefixing; `None` disables prefixing.
    pub browsers: Option<Browsers>,

    /// Add vendor prefixes.
    pub prefix: bool,

    /// Minify the output.
    pub minify: bool,
}

/// Run the prefix pass, then the minify pass, over `source`.
///
/// The minify pass re-parses the prefixed output with the same targets so the
/// added prefixes are not folded away again.
pub fn process_style(filename: &str, source: &str, options: StyleOptions) -> Result<String, String> {
    let targets = if options.prefix {
        Targets {
            browsers: options.browsers,
            ..Targets::default()
        }
    } else {
        Targets::default()
    };

    let prefixed = if options.prefix {
        run_pass(filename, source, targets, false)?
    } else {
        source.to_string()
    };

    if options.minify {
        run_pass(filename, &prefixed, targets, true)
    } else {
        Ok(prefixed)
    }
}

fn run_pass(filename: &str, source: &str, targets: Targets, minify: bool) -> Result<String, String> {
    let mut sheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| e.to_string())?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let result = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    Ok(result.code)
}

#[cfg(test)]
mod tests {
    use hubsite_core::config::DEFAULT_BROWSERS;

    use super::*;

    fn default_browsers() -> Option<Browsers> {
        let queries: Vec<String> = DEFAULT_BROWSERS.iter().map(|b| (*b).to_string()).collect();
        browser_targets(&queries).unwrap()
    }

    #[test]
    fn test_default_matrix_resolves() {
        assert!(default_browsers().is_some());
    }

    #[test]
    fn test_invalid_query() {
        assert!(browser_targets(&["not a real browser >= 1".to_string()]).is_err());
    }

    #[test]
    fn test_prefixes_survive_minification() {
        let options = StyleOptions {
            browsers: default_browsers(),
            prefix: true,
            minify: true,
        };
        let css = ".card {\n  display: flex;\n  user-select: none;\n}\n";
        let out = process_style("site.css", css, options).unwrap();

        assert!(out.contains("-webkit-user-select"), "{out}");
        assert!(!out.contains('\n'), "{out}");
    }

    #[test]
    fn test_prefix_only_keeps_formatting() {
        let options = StyleOptions {
            browsers: default_browsers(),
            prefix: true,
            minify: false,
        };
        let out = process_style("site.css", "a { user-select: none; }", options).unwrap();
        assert!(out.contains("-webkit-user-select"));
        assert!(out.contains('\n'));
    }

    #[test]
    fn test_minify_without_prefixing() {
        let options = StyleOptions {
            browsers: default_browsers(),
            prefix: false,
            minify: true,
        };
        let out = process_style("site.css", "a {\n  color: #ff0000;\n}\n", options).unwrap();
        assert_eq!(out, "a{color:red}");
    }
}
