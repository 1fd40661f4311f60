//! Maps symptom message text to a defect kind.
//!
//! An ordered (pattern, kind) table where the first match wins, so table
//! order encodes priority: unresolved-reference patterns sit above the
//! generic logic patterns an undefined name can superficially resemble.
//! Unmatched text falls back to LOGIC, the kind with the least destructive
//! fix strategies. Matching is case-insensitive and looks only at the
//! message, never at the file path.

use regex::Regex;

use crate::model::{DefectKind, Framework};

const PYTHON_TABLE: &[(&str, DefectKind)] = &[
    // Unresolved references
    (
        r"(?:ModuleNotFoundError|ImportError):",
        DefectKind::UnresolvedReference,
    ),
    (r"No module named", DefectKind::UnresolvedReference),
    (
        r"cannot import name\s+['\x22](\S+)['\x22]",
        DefectKind::UnresolvedReference,
    ),
    (
        r"NameError:|name\s+'\w+'\s+is not defined",
        DefectKind::UnresolvedReference,
    ),
    // Indentation before syntax: IndentationError is a SyntaxError subclass
    // and its message often contains the word "syntax"
    (r"IndentationError:", DefectKind::Indentation),
    (r"TabError:", DefectKind::Indentation),
    (r"unexpected indent|unindent does not match", DefectKind::Indentation),
    (r"inconsistent use of tabs", DefectKind::Indentation),
    // Syntax
    (r"SyntaxError:", DefectKind::Syntax),
    (r"invalid syntax", DefectKind::Syntax),
    (r"unexpected EOF|was never closed|EOL while scanning", DefectKind::Syntax),
    // Type mismatches
    (r"TypeError:", DefectKind::TypeMismatch),
    (r"unsupported operand type", DefectKind::TypeMismatch),
    // Style / lint findings
    (r"\b[EW]\d{3}\b", DefectKind::Style),
    (r"flake8|pylint|pycodestyle", DefectKind::Style),
    (r"unused import", DefectKind::Style),
    (r"trailing whitespace", DefectKind::Style),
    // Logic (assertion failures, wrong results)
    (r"AssertionError", DefectKind::Logic),
    (r"assert\s+.*==", DefectKind::Logic),
    (r"Expected\s+.*but\s+got", DefectKind::Logic),
];

const JS_TABLE: &[(&str, DefectKind)] = &[
    (
        r"Cannot find module\s+['\x22](\S+)['\x22]",
        DefectKind::UnresolvedReference,
    ),
    (r"is not defined", DefectKind::UnresolvedReference),
    (r"Module not found", DefectKind::UnresolvedReference),
    (r"SyntaxError:", DefectKind::Syntax),
    (r"Unexpected token", DefectKind::Syntax),
    (r"TypeError:", DefectKind::TypeMismatch),
    (r"is not a function", DefectKind::TypeMismatch),
    (r"Cannot read propert", DefectKind::TypeMismatch),
    (r"eslint|no-unused-vars|no-undef", DefectKind::Style),
    (r"expect\(.*\)\.to", DefectKind::Logic),
    (r"Expected.*to\s+(equal|be|match|deep)", DefectKind::Logic),
    (r"AssertionError", DefectKind::Logic),
];

/// Deterministic message-text classifier.
pub struct Classifier {
    python: Vec<(Regex, DefectKind)>,
    js: Vec<(Regex, DefectKind)>,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            python: compile(PYTHON_TABLE),
            js: compile(JS_TABLE),
        }
    }

    /// First matching pattern wins; unmatched text is LOGIC.
    pub fn classify(&self, message: &str, framework: Framework) -> DefectKind {
        let table = if framework.is_python() {
            &self.python
        } else {
            &self.js
        };
        for (pattern, kind) in table {
            if pattern.is_match(message) {
                return *kind;
            }
        }
        DefectKind::Logic
    }

    /// The full ordered table for a framework, used by the fallback scan
    /// over raw output when no located occurrence was found.
    pub fn table(&self, framework: Framework) -> &[(Regex, DefectKind)] {
        if framework.is_python() {
            &self.python
        } else {
            &self.js
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(table: &[(&str, DefectKind)]) -> Vec<(Regex, DefectKind)> {
    table
        .iter()
        .map(|(pattern, kind)| {
            let re = Regex::new(&format!("(?i){}", pattern))
                .unwrap_or_else(|e| panic!("invalid classifier pattern {:?}: {}", pattern, e));
            (re, *kind)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_reference_beats_logic() {
        let c = Classifier::new();
        // A NameError inside an assertion context must classify as an
        // unresolved reference, not a logic failure
        let kind = c.classify(
            "NameError: name 'validator' is not defined",
            Framework::Pytest,
        );
        assert_eq!(kind, DefectKind::UnresolvedReference);
    }

    #[test]
    fn test_indentation_beats_syntax() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("IndentationError: unexpected indent", Framework::Pytest),
            DefectKind::Indentation
        );
        assert_eq!(
            c.classify("SyntaxError: invalid syntax", Framework::Pytest),
            DefectKind::Syntax
        );
    }

    #[test]
    fn test_fallback_is_logic() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("something entirely unrecognized", Framework::Pytest),
            DefectKind::Logic
        );
    }

    #[test]
    fn test_case_insensitive() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("TYPEERROR: unsupported operand type(s)", Framework::Pytest),
            DefectKind::TypeMismatch
        );
    }

    #[test]
    fn test_js_table_selected_for_jest() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("ReferenceError: foo is not defined", Framework::Jest),
            DefectKind::UnresolvedReference
        );
        assert_eq!(
            c.classify("TypeError: foo.bar is not a function", Framework::Jest),
            DefectKind::TypeMismatch
        );
    }
}
