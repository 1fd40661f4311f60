//! Resolves an unresolved-reference symptom to the file that actually
//! broke, when the referenced module itself fails to parse.
//!
//! A `NameError` or import failure often surfaces far from its origin: the
//! import machinery swallows the syntax error in the imported module and the
//! test run reports the use site instead. Tracing substitutes the defect at
//! the true failure location so it is repaired first.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::imports;
use crate::model::{Defect, DefectKind};
use crate::parse;
use crate::scan;
use crate::snippet;

pub struct RootCauseTracer {
    root: PathBuf,
    name_not_defined: Regex,
    module_missing: Regex,
    import_name: Regex,
}

impl RootCauseTracer {
    pub fn new(repo_root: &Path) -> Self {
        Self {
            root: repo_root.to_path_buf(),
            name_not_defined: Regex::new(r"name\s+['\x22](\w+)['\x22]\s+is not defined")
                .expect("name pattern"),
            module_missing: Regex::new(r"[Nn]o module named\s+['\x22]?([\w.]+)['\x22]?")
                .expect("module pattern"),
            import_name: Regex::new(r"cannot import name\s+['\x22](\w+)['\x22](?:\s+from\s+['\x22]([\w.]+)['\x22])?")
                .expect("import-name pattern"),
        }
    }

    /// Attempt to trace `defect` to a root cause in another file. Returns
    /// the substituted defect, or `None` when the reference resolves to a
    /// file that parses cleanly (a naming/usage problem, not a root-file
    /// defect) or cannot be resolved at all.
    pub fn trace(&self, defect: &Defect) -> Option<Defect> {
        if defect.kind != DefectKind::UnresolvedReference {
            return None;
        }

        let target = self.trace_target(defect)?;
        let candidate = imports::resolve_module_file(&self.root, &target)?;
        let content = fs::read_to_string(self.root.join(&candidate)).ok()?;

        let error_line = parse::first_error_line(&self.root.join(&candidate), &content)?;
        let lines: Vec<&str> = content.lines().collect();
        let kind = if scan::looks_like_indentation_error(&lines, error_line) {
            DefectKind::Indentation
        } else {
            DefectKind::Syntax
        };

        let file = candidate.to_string_lossy().to_string();
        debug!(
            from = %defect.file,
            to = %file,
            line = error_line,
            "traced unresolved reference to parse failure"
        );
        Some(Defect {
            file: file.clone(),
            line: error_line,
            kind,
            message: format!(
                "{} fails to parse; root cause of: {}",
                file, defect.message
            ),
            snippet: snippet::read_snippet(&self.root, &file, error_line),
        })
    }

    /// The dotted module to resolve, from either symptom shape.
    fn trace_target(&self, defect: &Defect) -> Option<String> {
        // Shape 2: the message names the failing module or symbol directly
        if let Some(cap) = self.module_missing.captures(&defect.message) {
            return Some(cap[1].to_string());
        }
        if let Some(cap) = self.import_name.captures(&defect.message) {
            if let Some(module) = cap.get(2) {
                return Some(module.as_str().to_string());
            }
            return Some(cap[1].to_string());
        }

        // Shape 1: an undefined name, resolved through the defect file's
        // own import statements
        let cap = self.name_not_defined.captures(&defect.message)?;
        let name = cap[1].to_string();
        let content = fs::read_to_string(self.root.join(&defect.file)).ok()?;
        let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
        let (_, module) = imports::binding_for_name(&lines, &name)?;
        Some(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn defect(file: &str, message: &str) -> Defect {
        Defect {
            file: file.to_string(),
            line: 1,
            kind: DefectKind::UnresolvedReference,
            message: message.to_string(),
            snippet: String::new(),
        }
    }

    #[test]
    fn test_trace_module_missing_to_broken_file() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(
            dir.path().join("src/helper.py"),
            "def f():\n    return (1 + \n",
        )
        .unwrap();

        let tracer = RootCauseTracer::new(dir.path());
        let d = defect("src/app.py", "ImportError: No module named 'src.helper'");
        let traced = tracer.trace(&d).unwrap();
        assert_eq!(traced.file, "src/helper.py");
        assert_eq!(traced.kind, DefectKind::Syntax);
        assert!(traced.line >= 1);
    }

    #[test]
    fn test_trace_undefined_name_through_imports() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(
            dir.path().join("src/app.py"),
            "import src.validator\n\nsrc_validator = validator.run()\n",
        )
        .unwrap();
        fs::write(dir.path().join("src/validator.py"), "def run(:\n    pass\n").unwrap();

        let tracer = RootCauseTracer::new(dir.path());
        let d = defect("src/app.py", "NameError: name 'validator' is not defined");
        let traced = tracer.trace(&d).unwrap();
        assert_eq!(traced.file, "src/validator.py");
    }

    #[test]
    fn test_trace_is_idempotent_on_clean_target() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/helper.py"), "def f():\n    return 1\n").unwrap();

        let tracer = RootCauseTracer::new(dir.path());
        let d = defect("src/app.py", "ImportError: No module named 'src.helper'");
        assert!(tracer.trace(&d).is_none());
        // Repeated calls keep returning no substitution
        assert!(tracer.trace(&d).is_none());
    }

    #[test]
    fn test_trace_ignores_other_kinds_and_unresolvable_targets() {
        let dir = tempdir().unwrap();
        let tracer = RootCauseTracer::new(dir.path());

        let mut d = defect("src/app.py", "No module named 'ghost.module'");
        assert!(tracer.trace(&d).is_none());

        d.kind = DefectKind::Logic;
        assert!(tracer.trace(&d).is_none());
    }
}
