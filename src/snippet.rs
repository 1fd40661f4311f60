//! Renders the lines around a defect with a marker on the target line.

use std::fs;
use std::path::Path;

const DEFAULT_CONTEXT: usize = 3;

/// Read `context` lines either side of `line` (1-based) from `file` under
/// `repo_root`, marking the target line with `>>>`. Returns an empty string
/// when the file is missing or the line is out of range.
pub fn read_snippet(repo_root: &Path, file: &str, line: usize) -> String {
    read_snippet_with_context(repo_root, file, line, DEFAULT_CONTEXT)
}

pub fn read_snippet_with_context(
    repo_root: &Path,
    file: &str,
    line: usize,
    context: usize,
) -> String {
    if line == 0 {
        return String::new();
    }
    let full_path = repo_root.join(file);
    let Ok(content) = fs::read_to_string(&full_path) else {
        return String::new();
    };
    render(&content, line, context)
}

fn render(content: &str, line: usize, context: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if line > lines.len() {
        return String::new();
    }

    let start = line.saturating_sub(context + 1);
    let end = (line + context).min(lines.len());

    let mut out = Vec::with_capacity(end - start);
    for (i, text) in lines.iter().enumerate().take(end).skip(start) {
        let marker = if i + 1 == line { ">>>" } else { "   " };
        out.push(format!("{} {}: {}", marker, i + 1, text));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_render_marks_target_line() {
        let content = "a\nb\nc\nd\ne\n";
        let snippet = render(content, 3, 1);
        assert_eq!(snippet, "    2: b\n>>> 3: c\n    4: d");
    }

    #[test]
    fn test_render_clamps_at_file_edges() {
        let content = "a\nb\n";
        let snippet = render(content, 1, 3);
        assert_eq!(snippet, ">>> 1: a\n    2: b");
        assert_eq!(render(content, 9, 3), "");
    }

    #[test]
    fn test_read_snippet_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(read_snippet(dir.path(), "nope.py", 1), "");
    }

    #[test]
    fn test_read_snippet_from_disk() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("m.py"), "x = 1\ny = 2\n").unwrap();
        let snippet = read_snippet(dir.path(), "m.py", 2);
        assert!(snippet.contains(">>> 2: y = 2"));
    }
}
