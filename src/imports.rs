//! Line-oriented parsing of Python import statements and dotted-module
//! resolution. Shared by the static scanner, the root-cause tracer, and the
//! unresolved-reference fix strategies.

use std::path::{Path, PathBuf};

use regex::Regex;

/// One name bound by an import statement, with the module it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// The identifier the import makes available in the file.
    pub name: String,
    /// Dotted module path (`a.b.c`), or the module a symbol was pulled from.
    pub module: String,
}

/// Parse the names bound by a single top-level import line.
///
/// Handles `import a.b.c`, `import a.b.c as x`, and
/// `from m import a, b as c`. Returns an empty list for non-import lines.
pub fn bindings(line: &str) -> Vec<ImportBinding> {
    let trimmed = line.trim();

    if let Some(rest) = trimmed.strip_prefix("from ") {
        let Some((module, names)) = rest.split_once(" import ") else {
            return Vec::new();
        };
        let module = module.trim().to_string();
        return names
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() || part == "*" {
                    return None;
                }
                let name = match part.split_once(" as ") {
                    Some((_, alias)) => alias.trim(),
                    None => part,
                };
                Some(ImportBinding {
                    name: name.to_string(),
                    module: module.clone(),
                })
            })
            .collect();
    }

    if let Some(rest) = trimmed.strip_prefix("import ") {
        return rest
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                match part.split_once(" as ") {
                    Some((module, alias)) => Some(ImportBinding {
                        name: alias.trim().to_string(),
                        module: module.trim().to_string(),
                    }),
                    // `import a.b.c` binds the top package `a`
                    None => Some(ImportBinding {
                        name: part.split('.').next().unwrap_or(part).to_string(),
                        module: part.to_string(),
                    }),
                }
            })
            .collect();
    }

    Vec::new()
}

/// Find the import line in `lines` that binds `name`, returning the 1-based
/// line number and the dotted module it maps to.
///
/// `import a.b.name` (unaliased) also counts as a plausible source for
/// `name`: the user likely meant to alias the leaf module.
pub fn binding_for_name(lines: &[String], name: &str) -> Option<(usize, String)> {
    for (idx, line) in lines.iter().enumerate() {
        for binding in bindings(line) {
            if binding.name == name {
                return Some((idx + 1, binding.module));
            }
            // Leaf-module match: `import src.validator` for name `validator`
            if binding.module.split('.').next_back() == Some(name) {
                return Some((idx + 1, binding.module));
            }
        }
    }
    None
}

/// Map dotted module notation to a repository-relative source file:
/// `a.b.c` resolves to `a/b/c.py`, else the package init `a/b/c/__init__.py`.
pub fn resolve_module_file(repo_root: &Path, dotted: &str) -> Option<PathBuf> {
    let rel: PathBuf = dotted.split('.').collect();

    let module_file = rel.with_extension("py");
    if repo_root.join(&module_file).is_file() {
        return Some(module_file);
    }

    let package_init = rel.join("__init__.py");
    if repo_root.join(&package_init).is_file() {
        return Some(package_init);
    }

    None
}

/// Derive the dotted module path for a repository-relative Python file.
pub fn module_for_file(rel_path: &Path) -> String {
    let no_ext = rel_path.with_extension("");
    no_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Whether `name` appears as a whole-word token on any non-comment line of
/// `lines` other than line `skip` (1-based).
pub fn name_used_elsewhere(lines: &[String], name: &str, skip: usize) -> bool {
    let word = Regex::new(&format!(r"\b{}\b", regex::escape(name))).expect("word pattern");
    for (idx, line) in lines.iter().enumerate() {
        if idx + 1 == skip {
            continue;
        }
        let code = line.split('#').next().unwrap_or("");
        if word.is_match(code) {
            return true;
        }
    }
    false
}
