//! Parses raw test/compile output into located symptom occurrences.
//!
//! The framework hint only decides which location-pattern family applies:
//! traceback frames plus `file.py:NN:` markers for Python, `at file:NN:CC`
//! stack frames plus eslint-style markers for JS/TS. Occurrence order follows
//! first appearance in the text, not severity.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::model::Framework;
use crate::util::{is_vendored_path, relativize};

/// A raw `(file, line, message)` occurrence before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub file: String,
    pub line: usize,
    pub message: String,
}

pub struct SymptomExtractor {
    root: PathBuf,
    py_traceback: Regex,
    py_inline: Regex,
    js_frame: Regex,
    js_inline: Regex,
}

impl SymptomExtractor {
    pub fn new(repo_root: &Path) -> Self {
        Self {
            root: repo_root.to_path_buf(),
            // File "path/to/file.py", line N ... following message line
            py_traceback: Regex::new(
                r#"File\s+"([^"]+)",\s+line\s+(\d+)(?:.*\n\s+.*\n(\S.*))?"#,
            )
            .expect("traceback pattern"),
            // pytest short form: file.py:NN: ErrorType: msg
            py_inline: Regex::new(r"(\S+\.py):(\d+):\s*(.*(?:Error|error).*)").expect("inline pattern"),
            // at fn (path/to/file.js:NN:CC)
            js_frame: Regex::new(r"at\s+(?:\S+\s+\()?(\S+\.(?:jsx?|tsx?|mjs|cjs)):(\d+):\d+")
                .expect("frame pattern"),
            // eslint or generic: file.js:NN:CC: msg
            js_inline: Regex::new(r"(\S+\.(?:jsx?|tsx?|mjs|cjs)):(\d+):\d+:?\s*(.*)")
                .expect("inline js pattern"),
        }
    }

    /// Extract ordered occurrences from combined stdout+stderr. Never
    /// panics on empty or malformed input; returns an empty list instead.
    pub fn extract(&self, stdout: &str, stderr: &str, framework: Framework) -> Vec<Occurrence> {
        let combined = format!("{}\n{}", stdout, stderr);
        let mut out = Vec::new();

        if framework.is_python() {
            for cap in self.py_traceback.captures_iter(&combined) {
                let raw_file = &cap[1];
                // "<string>", "<stdin>" and friends are not editable files
                if raw_file.starts_with('<') {
                    continue;
                }
                let Some(line) = cap[2].parse::<usize>().ok() else {
                    continue;
                };
                let message = cap.get(3).map(|m| m.as_str()).unwrap_or("").to_string();
                self.push(&mut out, raw_file, line, message);
            }
            for cap in self.py_inline.captures_iter(&combined) {
                if let Ok(line) = cap[2].parse::<usize>() {
                    self.push(&mut out, &cap[1], line, cap[3].to_string());
                }
            }
        } else {
            for cap in self.js_frame.captures_iter(&combined) {
                if let Ok(line) = cap[2].parse::<usize>() {
                    self.push(&mut out, &cap[1], line, String::new());
                }
            }
            for cap in self.js_inline.captures_iter(&combined) {
                if let Ok(line) = cap[2].parse::<usize>() {
                    self.push(&mut out, &cap[1], line, cap[3].to_string());
                }
            }
        }

        out
    }

    fn push(&self, out: &mut Vec<Occurrence>, raw_file: &str, line: usize, message: String) {
        let file = relativize(raw_file, &self.root);
        // Vendored and third-party code is never edited
        if is_vendored_path(&file) || is_vendored_path(raw_file) {
            return;
        }
        out.push(Occurrence {
            file,
            line,
            message,
        });
    }
}
