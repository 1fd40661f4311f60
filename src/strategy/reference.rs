//! Strategies for unresolved references and style findings.
//!
//! Preference order for missing names: repair an existing import (alias or
//! typo) before inventing a new import line, and only synthesize an import
//! when a same-named definition actually exists in the repository.

use std::sync::LazyLock;

use regex::Regex;

use crate::imports;
use crate::model::Defect;

use super::{Edit, StrategyCtx};

static UNDEFINED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"name\s+['\x22](\w+)['\x22]\s+is not defined|['\x22]?(\w+)['\x22]?\s+is not defined")
        .expect("name pattern")
});
static MISSING_MODULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:No module named|Cannot find module)\s+['\x22]?([\w.]+)['\x22]?")
        .expect("module pattern")
});
static TOP_LEVEL_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:def|class)\s+(\w+)").expect("def pattern"));

/// Frequent module-name misspellings, checked in order; the first literal
/// substring match wins.
const KNOWN_TYPOS: &[(&str, &str)] = &[
    ("colections", "collections"),
    ("ittertools", "itertools"),
    ("jsons", "json"),
    ("maths", "math"),
    ("os.paths", "os.path"),
    ("requets", "requests"),
    ("numppy", "numpy"),
    ("pands", "pandas"),
];

fn undefined_name(message: &str) -> Option<String> {
    let cap = UNDEFINED_NAME.captures(message)?;
    cap.get(1)
        .or_else(|| cap.get(2))
        .map(|m| m.as_str().to_string())
}

/// An unaliased `import a.b.name` leaves `name` unbound at the use site;
/// adding an explicit alias is preferred over inventing a new import.
pub fn alias_existing_import(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let Some(name) = undefined_name(&defect.message) else {
        return Edit::None;
    };

    // Already bound by some import: not an aliasing problem
    if lines
        .iter()
        .flat_map(|l| imports::bindings(l))
        .any(|b| b.name == name)
    {
        return Edit::None;
    }

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        let Some(module) = trimmed.strip_prefix("import ") else {
            continue;
        };
        let module = module.trim();
        if module.contains(" as ") || module.contains(',') {
            continue;
        }
        if module.split('.').next_back() == Some(name.as_str()) {
            return Edit::SameFile {
                line: idx + 1,
                text: format!("import {} as {}", module, name),
            };
        }
    }
    Edit::None
}

/// Fix a misspelled module name against the static typo table.
pub fn fix_known_typo(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let Some(cap) = MISSING_MODULE.captures(&defect.message) else {
        return Edit::None;
    };
    let module = &cap[1];

    for (typo, correction) in KNOWN_TYPOS {
        if !module.contains(typo) {
            continue;
        }
        for (idx, line) in lines.iter().enumerate() {
            if line.contains(typo) {
                return Edit::SameFile {
                    line: idx + 1,
                    text: line.replacen(typo, correction, 1),
                };
            }
        }
    }
    Edit::None
}

/// Last resort for an undefined name: when a same-named top-level definition
/// exists elsewhere in the repository, prepend an explicit import for it.
pub fn synthesize_import(defect: &Defect, lines: &[String], ctx: &StrategyCtx) -> Edit {
    let Some(name) = undefined_name(&defect.message) else {
        return Edit::None;
    };
    if lines.is_empty() {
        return Edit::None;
    }

    // An import already mentioning the name plausibly corresponds to it;
    // that is the alias strategy's territory
    if lines
        .iter()
        .any(|l| !imports::bindings(l).is_empty() && l.contains(name.as_str()))
    {
        return Edit::None;
    }

    let defines_name = |l: &String| {
        TOP_LEVEL_DEF
            .captures(l)
            .map(|c| &c[1] == name.as_str())
            .unwrap_or(false)
    };

    for rel in ctx.python_sources() {
        if rel.to_string_lossy() == defect.file {
            continue;
        }
        let Some(source) = ctx.read_lines(&rel) else {
            continue;
        };
        if !source.iter().any(defines_name) {
            continue;
        }
        let module = imports::module_for_file(&rel);
        return Edit::SameFile {
            line: 1,
            text: format!("from {} import {}\n{}", module, name, lines[0]),
        };
    }
    Edit::None
}

/// Blank the offending import line rather than deleting it, preserving line
/// numbering for any other in-flight defect in the same file.
pub fn blank_unused_import(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    if !defect.message.to_lowercase().contains("unused import") {
        return Edit::None;
    }
    if defect.line == 0 || defect.line > lines.len() {
        return Edit::None;
    }
    if imports::bindings(&lines[defect.line - 1]).is_empty() {
        return Edit::None;
    }
    Edit::SameFile {
        line: defect.line,
        text: String::new(),
    }
}

/// Strip trailing whitespace flagged by lint output (W291/W293); the splice
/// step restores the file's final newline as a side effect (W292).
pub fn trim_trailing_whitespace(defect: &Defect, lines: &[String], _ctx: &StrategyCtx) -> Edit {
    let msg = defect.message.to_lowercase();
    let relevant = msg.contains("trailing whitespace")
        || msg.contains("no newline")
        || defect.message.contains("W29");
    if !relevant {
        return Edit::None;
    }
    if defect.line == 0 || defect.line > lines.len() {
        return Edit::None;
    }
    let line = &lines[defect.line - 1];
    Edit::SameFile {
        line: defect.line,
        text: line.trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DefectKind;
    use std::fs;
    use tempfile::tempdir;

    fn ctx_at(root: &std::path::Path) -> StrategyCtx {
        StrategyCtx {
            root: root.to_path_buf(),
        }
    }

    fn defect(file: &str, line: usize, kind: DefectKind, message: &str) -> Defect {
        Defect {
            file: file.to_string(),
            line,
            kind,
            message: message.to_string(),
            snippet: String::new(),
        }
    }

    fn lines(src: &[&str]) -> Vec<String> {
        src.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_alias_existing_import() {
        let dir = tempdir().unwrap();
        let src = lines(&[
            "import os",
            "import src.validator",
            "",
            "result = validator.run()",
        ]);
        let d = defect(
            "app.py",
            4,
            DefectKind::UnresolvedReference,
            "NameError: name 'validator' is not defined",
        );
        let edit = alias_existing_import(&d, &src, &ctx_at(dir.path()));
        assert_eq!(
            edit,
            Edit::SameFile {
                line: 2,
                text: "import src.validator as validator".to_string()
            }
        );
    }

    #[test]
    fn test_alias_skips_already_bound_names() {
        let dir = tempdir().unwrap();
        let src = lines(&["from src import validator", "validator.run()"]);
        let d = defect(
            "app.py",
            2,
            DefectKind::UnresolvedReference,
            "NameError: name 'validator' is not defined",
        );
        assert_eq!(alias_existing_import(&d, &src, &ctx_at(dir.path())), Edit::None);
    }

    #[test]
    fn test_fix_known_typo_first_match_wins() {
        let dir = tempdir().unwrap();
        let src = lines(&["import colections", "d = colections.OrderedDict()"]);
        let d = defect(
            "app.py",
            1,
            DefectKind::UnresolvedReference,
            "ModuleNotFoundError: No module named 'colections'",
        );
        let edit = fix_known_typo(&d, &src, &ctx_at(dir.path()));
        assert_eq!(
            edit,
            Edit::SameFile {
                line: 1,
                text: "import collections".to_string()
            }
        );
    }

    #[test]
    fn test_synthesize_import_requires_definition() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("helpers.py"),
            "def validate(data):\n    return bool(data)\n",
        )
        .unwrap();

        let src = lines(&["import os", "", "ok = validate(payload)"]);
        let d = defect(
            "app.py",
            3,
            DefectKind::UnresolvedReference,
            "NameError: name 'validate' is not defined",
        );
        let edit = synthesize_import(&d, &src, &ctx_at(dir.path()));
        assert_eq!(
            edit,
            Edit::SameFile {
                line: 1,
                text: "from helpers import validate\nimport os".to_string()
            }
        );

        let d_missing = defect(
            "app.py",
            3,
            DefectKind::UnresolvedReference,
            "NameError: name 'vanished' is not defined",
        );
        assert_eq!(synthesize_import(&d_missing, &src, &ctx_at(dir.path())), Edit::None);
    }

    #[test]
    fn test_synthesize_import_ignores_nested_definitions() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("helpers.py"),
            "class Factory:\n    def validate(self):\n        return True\n",
        )
        .unwrap();

        let src = lines(&["ok = validate(payload)"]);
        let d = defect(
            "app.py",
            1,
            DefectKind::UnresolvedReference,
            "NameError: name 'validate' is not defined",
        );
        // A method inside a class is not importable by name
        assert_eq!(synthesize_import(&d, &src, &ctx_at(dir.path())), Edit::None);
    }

    #[test]
    fn test_blank_unused_import_preserves_line_numbering() {
        let dir = tempdir().unwrap();
        let src = lines(&["import os", "import json", "json.dumps({})"]);
        let d = defect("app.py", 1, DefectKind::Style, "unused import 'os'");
        let edit = blank_unused_import(&d, &src, &ctx_at(dir.path()));
        assert_eq!(
            edit,
            Edit::SameFile {
                line: 1,
                text: String::new()
            }
        );
    }

    #[test]
    fn test_blank_unused_import_refuses_non_import_lines() {
        let dir = tempdir().unwrap();
        let src = lines(&["x = 1"]);
        let d = defect("app.py", 1, DefectKind::Style, "unused import 'x'");
        assert_eq!(blank_unused_import(&d, &src, &ctx_at(dir.path())), Edit::None);
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        let dir = tempdir().unwrap();
        let src = lines(&["x = 1   "]);
        let d = defect("app.py", 1, DefectKind::Style, "W291 trailing whitespace");
        let edit = trim_trailing_whitespace(&d, &src, &ctx_at(dir.path()));
        assert_eq!(
            edit,
            Edit::SameFile {
                line: 1,
                text: "x = 1".to_string()
            }
        );
    }
}
