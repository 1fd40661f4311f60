//! Tree-sitter parse checks used as the cheap local verification step.
//!
//! Parsers are expensive to create but reusable, so each thread keeps its own
//! pre-configured parser per language (the static scanner parses in parallel).

use std::cell::RefCell;
use std::path::Path;

use anyhow::{anyhow, Result};
use tree_sitter::Parser;

/// Source languages the engine can re-parse and scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Unknown,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        match ext.to_lowercase().as_str() {
            "py" | "pyi" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            _ => Language::Unknown,
        }
    }
}

thread_local! {
    static PYTHON_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // Ignored here; surfaces at parse time if the grammar failed to load
        let _ = p.set_language(&tree_sitter_python::LANGUAGE.into());
        p
    });

    static JS_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_javascript::LANGUAGE.into());
        p
    });

    static TS_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into());
        p
    });

    static TSX_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into());
        p
    });
}

fn parse_with_pooled_parser(
    content: &str,
    language: Language,
    path: Option<&Path>,
) -> Result<tree_sitter::Tree> {
    let parse_result = match language {
        Language::Python => PYTHON_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::JavaScript => JS_PARSER.with(|p| p.borrow_mut().parse(content, None)),
        Language::TypeScript => {
            let use_tsx = path
                .and_then(|p| p.extension())
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("tsx"))
                .unwrap_or(false);
            if use_tsx {
                TSX_PARSER.with(|p| p.borrow_mut().parse(content, None))
            } else {
                TS_PARSER.with(|p| p.borrow_mut().parse(content, None))
            }
        }
        Language::Unknown => return Err(anyhow!("Unknown language")),
    };

    parse_result.ok_or_else(|| anyhow!("Failed to parse file"))
}

/// Returns true when the content parses without syntax error nodes.
///
/// Unknown languages are treated as clean: there is no grammar to check them
/// against, and edits to such files are verified by the next full test run.
pub fn parses_clean(path: &Path, content: &str) -> bool {
    let language = Language::from_path(path);
    if language == Language::Unknown {
        return true;
    }
    match parse_with_pooled_parser(content, language, Some(path)) {
        Ok(tree) => !tree.root_node().has_error(),
        Err(_) => true,
    }
}

/// 1-based line of the first error or missing node, if parsing failed.
pub fn first_error_line(path: &Path, content: &str) -> Option<usize> {
    let language = Language::from_path(path);
    if language == Language::Unknown {
        return None;
    }
    let tree = parse_with_pooled_parser(content, language, Some(path)).ok()?;
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }
    find_error_node_row(root).map(|row| row + 1)
}

fn find_error_node_row(node: tree_sitter::Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(row) = find_error_node_row(child) {
            return Some(row);
        }
    }
    // has_error was set but no concrete error node found below; blame this node
    Some(node.start_position().row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_clean_python_parses() {
        let src = "def add(a, b):\n    return a + b\n";
        assert!(parses_clean(Path::new("m.py"), src));
        assert_eq!(first_error_line(Path::new("m.py"), src), None);
    }

    #[test]
    fn test_broken_python_reports_error_line() {
        let src = "def add(a, b):\n    return (a + b\n";
        assert!(!parses_clean(Path::new("m.py"), src));
        assert!(first_error_line(Path::new("m.py"), src).is_some());
    }

    #[test]
    fn test_unknown_language_is_clean() {
        assert!(parses_clean(Path::new("notes.txt"), "((((("));
        assert_eq!(first_error_line(Path::new("notes.txt"), "((((("), None);
    }

    #[test]
    fn test_broken_javascript_detected() {
        let src = "function f( {\n  return 1;\n";
        assert!(!parses_clean(Path::new("m.js"), src));
    }
}
