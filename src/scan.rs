//! Proactive source scan, independent of any test run.
//!
//! Parses every supported source file under the repository root to surface
//! syntax failures the test runner never reached, plus a lightweight
//! unused-import check over top-level Python imports.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::imports;
use crate::model::{Defect, DefectKind};
use crate::parse::{self, Language};
use crate::snippet;
use crate::util;

const IGNORE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "vendor",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
];

const MESSAGE_CAP: usize = 200;

pub struct StaticScanner {
    root: PathBuf,
}

impl StaticScanner {
    pub fn new(repo_root: &Path) -> Self {
        Self {
            root: repo_root.to_path_buf(),
        }
    }

    /// Scan the whole tree. Parse failures come first (they gate the
    /// unused-import sub-scan for their file), then style findings.
    pub fn scan(&self) -> Vec<Defect> {
        let files = self.source_files();

        let parsed: Vec<(PathBuf, String, Option<usize>)> = files
            .par_iter()
            .filter_map(|rel| {
                let content = fs::read_to_string(self.root.join(rel)).ok()?;
                let error_line = parse::first_error_line(&self.root.join(rel), &content);
                Some((rel.clone(), content, error_line))
            })
            .collect();

        let mut defects = Vec::new();

        for (rel, content, error_line) in &parsed {
            let Some(error_line) = error_line else {
                continue;
            };
            let lines: Vec<&str> = content.lines().collect();
            let kind = if looks_like_indentation_error(&lines, *error_line) {
                DefectKind::Indentation
            } else {
                DefectKind::Syntax
            };
            let rel_str = rel.to_string_lossy().to_string();
            debug!(file = %rel_str, line = error_line, %kind, "static scan found parse failure");
            defects.push(Defect {
                file: rel_str.clone(),
                line: *error_line,
                kind,
                message: util::truncate(
                    &format!("{} does not parse near line {}", rel_str, error_line),
                    MESSAGE_CAP,
                ),
                snippet: snippet::read_snippet(&self.root, &rel_str, *error_line),
            });
        }

        for (rel, content, error_line) in &parsed {
            // No point analyzing symbol usage in invalid code
            if error_line.is_some() {
                continue;
            }
            defects.extend(self.unused_imports(rel, content));
        }

        defects
    }

    fn source_files(&self) -> Vec<PathBuf> {
        list_source_files(&self.root)
    }

    /// Line-oriented unused-import check for Python files. Test files and
    /// package `__init__.py` re-export modules are left alone.
    fn unused_imports(&self, rel: &Path, content: &str) -> Vec<Defect> {
        if Language::from_path(rel) != Language::Python || is_exempt_from_import_scan(rel) {
            return Vec::new();
        }

        let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
        let mut defects = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            // Top-level statements only
            if line.starts_with(char::is_whitespace) {
                continue;
            }
            for binding in imports::bindings(line) {
                if imports::name_used_elsewhere(&lines, &binding.name, idx + 1) {
                    continue;
                }
                let rel_str = rel.to_string_lossy().to_string();
                defects.push(Defect {
                    file: rel_str,
                    line: idx + 1,
                    kind: DefectKind::Style,
                    message: format!("unused import '{}'", binding.name),
                    snippet: String::new(),
                });
                break;
            }
        }

        defects
    }
}

/// Repository-relative paths of every recognized source file, with hidden,
/// control, and dependency-cache directories excluded.
pub fn list_source_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !should_ignore(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| Language::from_path(e.path()) != Language::Unknown)
        .filter_map(|e| e.path().strip_prefix(root).ok().map(PathBuf::from))
        .collect()
}

fn should_ignore(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| IGNORE_DIRS.contains(&name) || name.starts_with('.'))
        .unwrap_or(false)
}

fn is_exempt_from_import_scan(rel: &Path) -> bool {
    let name = rel
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    name == "__init__.py"
        || name.starts_with("test_")
        || name.ends_with("_test.py")
        || rel.components().any(|c| c.as_os_str() == "tests")
}

/// Shape heuristic for parse failures: the error line is deeper indented
/// than the nearest prior non-empty line even though that line does not open
/// a block. Tree-sitter reports no message text, so this stands in for
/// Python's IndentationError/TabError distinction.
pub fn looks_like_indentation_error(lines: &[&str], error_line: usize) -> bool {
    if error_line < 2 || error_line > lines.len() {
        return false;
    }
    let current = lines[error_line - 1];
    if current.trim().is_empty() {
        return false;
    }
    let current_indent = util::indent_of(current).len();

    for prior in lines[..error_line - 1].iter().rev() {
        if prior.trim().is_empty() {
            continue;
        }
        let prior_indent = util::indent_of(prior).len();
        let opens_block = prior.trim_end().ends_with(':')
            || prior.trim_end().ends_with('{')
            || prior.trim_end().ends_with('(');
        return current_indent > prior_indent && !opens_block;
    }
    false
}
