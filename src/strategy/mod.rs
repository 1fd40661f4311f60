//! Fix strategy engine.
//!
//! Each defect kind maps to an ordered list of deterministic strategies. A
//! strategy is a pure function from the defect and its file's lines to an
//! [`Edit`]. The engine tries strategies in order: a same-file candidate is
//! written, locally re-parsed, and reverted if the re-parse fails; a
//! cross-file candidate is written directly and verified by the next full
//! test run. The first accepted candidate wins.

mod logic;
mod reference;
mod syntax;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::model::{Defect, DefectKind, Fix, FixStatus};
use crate::parse;
use crate::scan;

/// Outcome of one strategy invocation.
///
/// Line numbers are 1-based. `text` replaces the target line and may span
/// multiple lines (block insertion) or be empty (blank the line, preserving
/// numbering for other in-flight defects).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    None,
    SameFile { line: usize, text: String },
    CrossFile { file: String, line: usize, text: String },
}

/// Read-only repository context handed to strategies that search beyond the
/// defect's own file.
pub struct StrategyCtx {
    root: PathBuf,
}

impl StrategyCtx {
    /// Repository-relative Python sources, excluding test files.
    fn python_sources(&self) -> Vec<PathBuf> {
        scan::list_source_files(&self.root)
            .into_iter()
            .filter(|p| p.extension().map(|e| e == "py").unwrap_or(false))
            .filter(|p| {
                let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                !name.starts_with("test_") && !name.ends_with("_test.py")
            })
            .collect()
    }

    fn read_lines(&self, rel: &Path) -> Option<Vec<String>> {
        let content = fs::read_to_string(self.root.join(rel)).ok()?;
        Some(content.lines().map(|l| l.to_string()).collect())
    }
}

type Strategy = fn(&Defect, &[String], &StrategyCtx) -> Edit;

const SYNTAX_STRATEGIES: &[(&str, Strategy)] = &[
    ("append_block_terminator", syntax::append_block_terminator),
    ("balance_delimiters", syntax::balance_delimiters),
    ("balance_quotes", syntax::balance_quotes),
    ("strip_trailing_garbage", syntax::strip_trailing_garbage),
    ("promote_assignment_in_guard", logic::promote_assignment_in_guard),
    ("realign_indentation", syntax::realign_indentation),
];

const INDENT_STRATEGIES: &[(&str, Strategy)] = &[
    ("normalize_tabs", syntax::normalize_tabs),
    ("realign_indentation", syntax::realign_indentation),
];

// capture_dynamic_definition runs ahead of the generic strategies; the
// message gate (None/absent result) keeps the orderings mostly disjoint.
const LOGIC_STRATEGIES: &[(&str, Strategy)] = &[
    ("capture_dynamic_definition", logic::capture_dynamic_definition),
    ("promote_assignment_in_guard", logic::promote_assignment_in_guard),
    ("loosen_strict_inequality", logic::loosen_strict_inequality),
    ("flip_callee_operator", logic::flip_callee_operator),
];

const TYPE_STRATEGIES: &[(&str, Strategy)] = &[
    ("coerce_str_concat", logic::coerce_str_concat),
    ("guard_none_access", logic::guard_none_access),
];

const REFERENCE_STRATEGIES: &[(&str, Strategy)] = &[
    ("alias_existing_import", reference::alias_existing_import),
    ("fix_known_typo", reference::fix_known_typo),
    ("synthesize_import", reference::synthesize_import),
];

const STYLE_STRATEGIES: &[(&str, Strategy)] = &[
    ("blank_unused_import", reference::blank_unused_import),
    ("trim_trailing_whitespace", reference::trim_trailing_whitespace),
];

fn strategies_for(kind: DefectKind) -> &'static [(&'static str, Strategy)] {
    match kind {
        DefectKind::Syntax => SYNTAX_STRATEGIES,
        DefectKind::Indentation => INDENT_STRATEGIES,
        DefectKind::Logic => LOGIC_STRATEGIES,
        DefectKind::TypeMismatch => TYPE_STRATEGIES,
        DefectKind::UnresolvedReference => REFERENCE_STRATEGIES,
        DefectKind::Style => STYLE_STRATEGIES,
    }
}

/// Restores a file's original content on drop unless disarmed. Covers every
/// exit path of the write-and-reparse cycle, early returns and panics
/// included.
struct RevertGuard {
    path: PathBuf,
    original: String,
    armed: bool,
}

impl RevertGuard {
    fn arm(path: &Path, original: String) -> Self {
        Self {
            path: path.to_path_buf(),
            original,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RevertGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::write(&self.path, &self.original) {
                warn!(path = %self.path.display(), error = %e, "failed to revert candidate edit");
            }
        }
    }
}

/// Replace line `line` (1-based) with `text` (possibly multi-line, possibly
/// empty). Output always ends with a single trailing newline.
fn splice(lines: &[String], line: usize, text: &str) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 2);
    for (idx, existing) in lines.iter().enumerate() {
        if idx + 1 == line {
            out.extend(text.split('\n'));
        } else {
            out.push(existing);
        }
    }
    let mut joined = out.join("\n");
    joined.push('\n');
    joined
}

pub struct FixEngine {
    root: PathBuf,
}

impl FixEngine {
    pub fn new(repo_root: &Path) -> Self {
        Self {
            root: repo_root.to_path_buf(),
        }
    }

    /// Try each strategy for the defect's kind in order. Returns the first
    /// accepted fix: `Pending` for a locally re-parsed same-file edit,
    /// `Applied` for a cross-file edit. `None` when every strategy is
    /// exhausted, leaving the defect's file untouched.
    pub fn attempt(&self, defect: &Defect) -> Result<Option<Fix>> {
        let ctx = StrategyCtx {
            root: self.root.clone(),
        };

        let abs = self.root.join(&defect.file);
        let original = if defect.located() {
            fs::read_to_string(&abs).ok()
        } else {
            None
        };
        let lines: Vec<String> = original
            .as_deref()
            .unwrap_or("")
            .lines()
            .map(|l| l.to_string())
            .collect();

        for (name, strat) in strategies_for(defect.kind) {
            match strat(defect, &lines, &ctx) {
                Edit::None => continue,
                Edit::SameFile { line, text } => {
                    let Some(original) = original.as_ref() else {
                        continue;
                    };
                    if line == 0 || line > lines.len() {
                        continue;
                    }
                    let before = lines[line - 1].clone();
                    if text == before {
                        // No-op candidates are never recorded
                        continue;
                    }

                    let candidate = splice(&lines, line, &text);
                    let guard = RevertGuard::arm(&abs, original.clone());
                    fs::write(&abs, &candidate)
                        .with_context(|| format!("writing candidate to {}", defect.file))?;

                    if parse::parses_clean(&abs, &candidate) {
                        guard.disarm();
                        debug!(strategy = name, file = %defect.file, line, "accepted same-file fix");
                        return Ok(Some(Fix {
                            file: defect.file.clone(),
                            line,
                            kind: defect.kind,
                            before,
                            after: text,
                            commit_message: String::new(),
                            status: FixStatus::Pending,
                        }));
                    }
                    debug!(strategy = name, file = %defect.file, line, "candidate failed re-parse, reverted");
                    // guard drops here and restores the original content
                }
                Edit::CrossFile { file, line, text } => {
                    if file == defect.file {
                        // Same-file edits must go through the re-parse path
                        continue;
                    }
                    let target_abs = self.root.join(&file);
                    let Ok(content) = fs::read_to_string(&target_abs) else {
                        continue;
                    };
                    let target_lines: Vec<String> =
                        content.lines().map(|l| l.to_string()).collect();
                    if line == 0 || line > target_lines.len() {
                        continue;
                    }
                    let before = target_lines[line - 1].clone();
                    if text == before {
                        continue;
                    }

                    let candidate = splice(&target_lines, line, &text);
                    fs::write(&target_abs, candidate)
                        .with_context(|| format!("writing cross-file fix to {}", file))?;

                    debug!(strategy = name, from = %defect.file, to = %file, line, "applied cross-file fix");
                    return Ok(Some(Fix {
                        file,
                        line,
                        kind: defect.kind,
                        before,
                        after: text,
                        commit_message: String::new(),
                        status: FixStatus::Applied,
                    }));
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNKNOWN_FILE;
    use std::fs;
    use tempfile::tempdir;

    fn defect(file: &str, line: usize, kind: DefectKind, message: &str) -> Defect {
        Defect {
            file: file.to_string(),
            line,
            kind,
            message: message.to_string(),
            snippet: String::new(),
        }
    }

    #[test]
    fn test_splice_single_and_multi_line() {
        let lines: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(splice(&lines, 2, "B"), "a\nB\nc\n");
        assert_eq!(splice(&lines, 2, "x\ny"), "a\nx\ny\nc\n");
        assert_eq!(splice(&lines, 2, ""), "a\n\nc\n");
    }

    #[test]
    fn test_same_file_fix_accepted_after_reparse() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("m.py"),
            "def f():\n    return (1 + 2\n",
        )
        .unwrap();

        let engine = FixEngine::new(dir.path());
        let d = defect("m.py", 2, DefectKind::Syntax, "SyntaxError: '(' was never closed");
        let fix = engine.attempt(&d).unwrap().expect("fix accepted");

        assert_eq!(fix.status, FixStatus::Pending);
        assert_eq!(fix.after, "    return (1 + 2)");
        let healed = fs::read_to_string(dir.path().join("m.py")).unwrap();
        assert!(crate::parse::parses_clean(std::path::Path::new("m.py"), &healed));
    }

    #[test]
    fn test_file_never_left_unparsable() {
        // No strategy can mend this line; the original content must survive
        let dir = tempdir().unwrap();
        let original = "def f(:\n    pass\n";
        fs::write(dir.path().join("m.py"), original).unwrap();

        let engine = FixEngine::new(dir.path());
        let d = defect("m.py", 1, DefectKind::Indentation, "IndentationError: weird");
        let fix = engine.attempt(&d).unwrap();

        let on_disk = fs::read_to_string(dir.path().join("m.py")).unwrap();
        if fix.is_none() {
            assert_eq!(on_disk, original);
        } else {
            assert!(crate::parse::parses_clean(std::path::Path::new("m.py"), &on_disk));
        }
    }

    #[test]
    fn test_identical_candidate_is_noop() {
        let dir = tempdir().unwrap();
        let original = "x = 1\n";
        fs::write(dir.path().join("m.py"), original).unwrap();

        let engine = FixEngine::new(dir.path());
        // Style defect whose line carries no trailing whitespace: every
        // strategy yields the original text and nothing is recorded
        let d = defect("m.py", 1, DefectKind::Style, "W291 trailing whitespace");
        assert!(engine.attempt(&d).unwrap().is_none());
        assert_eq!(fs::read_to_string(dir.path().join("m.py")).unwrap(), original);
    }

    #[test]
    fn test_unlocated_defect_without_cross_file_target_is_skipped() {
        let dir = tempdir().unwrap();
        let engine = FixEngine::new(dir.path());
        let d = defect(UNKNOWN_FILE, 0, DefectKind::Logic, "AssertionError: assert 1 == 2");
        assert!(engine.attempt(&d).unwrap().is_none());
    }

    #[test]
    fn test_cross_file_fix_reported_as_applied() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("calc.py"),
            "def add(a, b):\n    return a - b\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("runner.py"),
            "from calc import add\n\nprint(add(2, 3))\n",
        )
        .unwrap();

        let engine = FixEngine::new(dir.path());
        let d = defect(
            "runner.py",
            3,
            DefectKind::Logic,
            "AssertionError: assert add(2, 3) == 5",
        );
        let fix = engine.attempt(&d).unwrap().expect("cross-file fix");
        assert_eq!(fix.file, "calc.py");
        assert_eq!(fix.status, FixStatus::Applied);
        assert!(fix.after.contains("a + b"));
    }
}
