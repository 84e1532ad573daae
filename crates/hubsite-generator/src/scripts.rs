//! JavaScript minification.

use std::{
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::LazyLock,
};

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;

static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// How a script is loaded by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Classic `<script>`: top-level names are globals.
    Classic,
    /// ES module (`.mjs`): `import` and `export` allowed.
    Module,
}

impl ScriptMode {
    /// `.mjs` files are modules, everything else is a classic script.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("mjs") => Self::Module,
            _ => Self::Classic,
        }
    }

    fn source_type(self) -> SourceType {
        SourceType::default().with_module(self == Self::Module)
    }
}

/// Block comments that must survive minification: `/*!` banners and comments
/// tagged `@license`, `@preserve` or `@cc_on`.
pub fn preserved_comments(source: &str) -> Vec<&str> {
    BLOCK_COMMENT
        .find_iter(source)
        .map(|m| m.as_str())
        .filter(|c| {
            c.starts_with("/*!")
                || c.contains("@license")
                || c.contains("@preserve")
                || c.contains("@cc_on")
        })
        .collect()
}

/// Minify a script, keeping preserved comments ahead of the minified code.
///
/// Parse errors and minifier panics are both returned as `Err`.
pub fn minify_script(source: &str, mode: ScriptMode) -> Result<String, String> {
    let code = panic::catch_unwind(AssertUnwindSafe(|| minify_code(source, mode)))
        .map_err(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            format!("minifier aborted: {reason}")
        })??;

    let comments = preserved_comments(source);
    if comments.is_empty() {
        return Ok(code);
    }

    let mut result = comments.join("\n");
    result.push('\n');
    result.push_str(&code);
    Ok(result)
}

fn minify_code(source: &str, mode: ScriptMode) -> Result<String, String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, mode.source_type()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        let messages = parsed
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        return Err(if messages.is_empty() {
            "failed to parse script".to_string()
        } else {
            messages.join("; ")
        });
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    Ok(Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserved_comments() {
        let source = "/*! banner v1 */\n/* plain */\n/** @license MIT */\nvar a = 1; /* @preserve keep */";
        assert_eq!(
            preserved_comments(source),
            vec!["/*! banner v1 */", "/** @license MIT */", "/* @preserve keep */"]
        );
    }

    #[test]
    fn test_script_mode_from_path() {
        assert_eq!(ScriptMode::from_path(Path::new("js/app.js")), ScriptMode::Classic);
        assert_eq!(ScriptMode::from_path(Path::new("js/app.MJS")), ScriptMode::Module);
        assert_eq!(ScriptMode::from_path(Path::new("js/app")), ScriptMode::Classic);
    }

    #[test]
    fn test_minify_keeps_license_and_drops_plain_comments() {
        let source = "/*! hubsite v1.0.0 */\n// line comment\n/* plain */\nfunction greet(name) {\n  return 'hi ' + name;\n}\nconsole.log(greet('x'));\n";
        let out = minify_script(source, ScriptMode::Classic).unwrap();

        assert!(out.starts_with("/*! hubsite v1.0.0 */\n"));
        assert!(!out.contains("plain"));
        assert!(!out.contains("line comment"));
        assert!(out.contains("console.log"));
        assert!(out.len() < source.len());
    }

    #[test]
    fn test_minify_module_with_import_and_export() {
        let source = "import { a } from './a.js';\n\nexport function f() {\n  return a + 1;\n}\n";
        let out = minify_script(source, ScriptMode::Module).unwrap();

        assert!(out.contains("import"));
        assert!(out.contains("./a.js"));
        assert!(out.contains("export"));
    }

    #[test]
    fn test_export_in_classic_script_is_an_error() {
        let source = "export function f() { return 1; }\n";
        assert!(minify_script(source, ScriptMode::Classic).is_err());
    }

    #[test]
    fn test_minify_keeps_class_getters() {
        let source = "class A {\n  get y() {\n    return 1;\n  }\n}\nconsole.log(new A().y);\n";
        let out = minify_script(source, ScriptMode::Classic).unwrap();

        assert!(out.contains("get y()"), "getter lost: {out}");
    }

    #[test]
    fn test_classic_globals_keep_their_names() {
        let source = "function showSignInError(message) {\n  return message;\n}\nvar apiBase = '/api';\n";
        let out = minify_script(source, ScriptMode::Classic).unwrap();

        assert!(out.contains("showSignInError"));
        assert!(out.contains("apiBase"));
    }

    #[test]
    fn test_minify_syntax_error() {
        assert!(minify_script("function (", ScriptMode::Classic).is_err());
    }
}
