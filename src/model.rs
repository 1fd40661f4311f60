//! Core data model shared by the extraction, classification, repair, and
//! reporting layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Placeholder file name for defects classified from raw output without a
/// usable source location.
pub const UNKNOWN_FILE: &str = "unknown";

/// Defect taxonomy. Serialized in SCREAMING_SNAKE_CASE so run records stay
/// stable and grep-friendly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefectKind {
    UnresolvedReference,
    Syntax,
    Logic,
    TypeMismatch,
    Style,
    Indentation,
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DefectKind::UnresolvedReference => "UNRESOLVED_REFERENCE",
            DefectKind::Syntax => "SYNTAX",
            DefectKind::Logic => "LOGIC",
            DefectKind::TypeMismatch => "TYPE_MISMATCH",
            DefectKind::Style => "STYLE",
            DefectKind::Indentation => "INDENTATION",
        };
        write!(f, "{}", name)
    }
}

/// One diagnosed problem at a source location. `line` is 1-based; a defect
/// at `(UNKNOWN_FILE, 0)` carries classification only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    pub file: String,
    pub line: usize,
    pub kind: DefectKind,
    pub message: String,
    pub snippet: String,
}

impl Defect {
    /// Whether the defect points at an actual file and line.
    pub fn located(&self) -> bool {
        self.line > 0 && self.file != UNKNOWN_FILE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    /// Edit accepted locally but not yet committed.
    Pending,
    /// Edit committed to the working tree.
    Applied,
    /// The suite went green with this fix in place.
    Verified,
    /// Edit was rejected and reverted.
    Failed,
}

/// A concrete, accepted edit: the before/after text of one line (or block)
/// plus its audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fix {
    pub file: String,
    pub line: usize,
    pub kind: DefectKind,
    pub before: String,
    pub after: String,
    pub commit_message: String,
    pub status: FixStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Passed,
    Failed,
    Error,
}

/// One test-and-repair round inside a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
    pub number: u32,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub defects_found: usize,
    pub fixes_applied: usize,
    pub status: RunStatus,
    /// Captured (truncated) combined test output for this round.
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

/// The complete record of one healing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub target: String,
    pub iterations: Vec<Iteration>,
    pub fixes: Vec<Fix>,
    pub total_commits: usize,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Run {
    pub fn new(target: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.to_string(),
            iterations: Vec::new(),
            fixes: Vec::new(),
            total_commits: 0,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }
}

/// Test framework hint carried through extraction and classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    Pytest,
    Unittest,
    Jest,
    Mocha,
    Unknown,
}

impl Framework {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "pytest" => Framework::Pytest,
            "unittest" => Framework::Unittest,
            "jest" => Framework::Jest,
            "mocha" => Framework::Mocha,
            _ => Framework::Unknown,
        }
    }

    /// Python-family frameworks share traceback and message formats.
    pub fn is_python(&self) -> bool {
        matches!(self, Framework::Pytest | Framework::Unittest | Framework::Unknown)
    }
}

/// Raw result of one suite execution.
#[derive(Debug, Clone)]
pub struct TestOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub framework: Framework,
}

impl TestOutput {
    /// Green means zero failures among at least one collected test; an empty
    /// suite is never green.
    pub fn all_green(&self) -> bool {
        self.failed == 0 && self.total > 0
    }

    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(passed: usize, failed: usize, total: usize) -> TestOutput {
        TestOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            passed,
            failed,
            total,
            framework: Framework::Pytest,
        }
    }

    #[test]
    fn test_empty_suite_is_not_green() {
        assert!(!output(0, 0, 0).all_green());
        assert!(output(3, 0, 3).all_green());
        assert!(!output(2, 1, 3).all_green());
    }

    #[test]
    fn test_defect_located() {
        let mut d = Defect {
            file: "src/app.py".to_string(),
            line: 4,
            kind: DefectKind::Syntax,
            message: String::new(),
            snippet: String::new(),
        };
        assert!(d.located());
        d.line = 0;
        assert!(!d.located());
        d.line = 4;
        d.file = UNKNOWN_FILE.to_string();
        assert!(!d.located());
    }

    #[test]
    fn test_defect_kind_serde_names() {
        let json = serde_json::to_string(&DefectKind::UnresolvedReference).unwrap();
        assert_eq!(json, "\"UNRESOLVED_REFERENCE\"");
        let back: DefectKind = serde_json::from_str("\"TYPE_MISMATCH\"").unwrap();
        assert_eq!(back, DefectKind::TypeMismatch);
    }

    #[test]
    fn test_framework_from_name() {
        assert_eq!(Framework::from_name("PyTest"), Framework::Pytest);
        assert_eq!(Framework::from_name("jest"), Framework::Jest);
        assert_eq!(Framework::from_name("cargo"), Framework::Unknown);
        assert!(Framework::Unittest.is_python());
        assert!(!Framework::Jest.is_python());
    }

    #[test]
    fn test_run_starts_running() {
        let run = Run::new("/tmp/project");
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());
        assert!(run.iterations.is_empty());
    }

    #[test]
    fn test_combined_output_joins_channels() {
        let mut o = output(0, 1, 1);
        o.stdout = "out".to_string();
        o.stderr = "err".to_string();
        assert_eq!(o.combined(), "out\nerr");
        o.stderr.clear();
        assert_eq!(o.combined(), "out");
    }
}
