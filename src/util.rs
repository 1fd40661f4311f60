use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Truncate to `max` characters, appending an ellipsis when content was cut.
pub fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }

    let char_count = s.chars().count();
    if char_count <= max {
        return s.to_string();
    }

    if max <= 3 {
        return s.chars().take(max).collect();
    }

    let truncated: String = s.chars().take(max - 3).collect();
    format!("{}...", truncated)
}

#[derive(Debug)]
pub struct CommandRunResult {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Run a command, capturing stdout/stderr, killing it after `timeout`.
pub fn run_command_with_timeout(
    command: &mut Command,
    timeout: Duration,
) -> Result<CommandRunResult, String> {
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to start command: {}", e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "Failed to capture stdout".to_string())?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| "Failed to capture stderr".to_string())?;

    let stdout_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        let mut reader = BufReader::new(stdout);
        let _ = reader.read_to_end(&mut buf);
        buf
    });
    let stderr_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        let mut reader = BufReader::new(stderr);
        let _ = reader.read_to_end(&mut buf);
        buf
    });

    let start = Instant::now();
    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    timed_out = true;
                    let _ = child.kill();
                    match child.wait() {
                        Ok(status) => break Some(status),
                        Err(_) => break None,
                    }
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(format!("Failed to wait for command: {}", e)),
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandRunResult {
        status,
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        timed_out,
    })
}

/// Rewrite an absolute path to repository-relative. Paths outside the root
/// collapse to their file name; relative paths pass through untouched.
pub fn relativize(path: &str, repo_root: &Path) -> String {
    let p = PathBuf::from(path);
    if !p.is_absolute() {
        return path.to_string();
    }
    if let Ok(rel) = p.strip_prefix(repo_root) {
        return rel.to_string_lossy().to_string();
    }
    p.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Path fragments identifying vendored/dependency code that is never edited.
const VENDOR_FRAGMENTS: &[&str] = &[
    "site-packages",
    "dist-packages",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv/",
    "vendor/",
    ".tox",
];

pub fn is_vendored_path(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    VENDOR_FRAGMENTS
        .iter()
        .any(|frag| normalized.contains(frag))
}

/// Leading whitespace of a line.
pub fn indent_of(line: &str) -> &str {
    let end = line.len() - line.trim_start().len();
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_truncate_unicode_safe() {
        let input = "ééééé";
        assert_eq!(truncate(input, 4), "é...");
        assert_eq!(truncate("こんにちは", 3), "こんに");
        assert_eq!(truncate("ok", 10), "ok");
        assert_eq!(truncate("anything", 0), "");
    }

    #[test]
    fn test_relativize_inside_and_outside_root() {
        let root = Path::new("/work/repo");
        assert_eq!(relativize("/work/repo/src/app.py", root), "src/app.py");
        assert_eq!(relativize("/elsewhere/other.py", root), "other.py");
        assert_eq!(relativize("src/app.py", root), "src/app.py");
    }

    #[test]
    fn test_is_vendored_path() {
        assert!(is_vendored_path("lib/python3.11/site-packages/flask/app.py"));
        assert!(is_vendored_path("node_modules/jest/index.js"));
        assert!(is_vendored_path(".venv/lib/os.py"));
        assert!(!is_vendored_path("src/app.py"));
    }

    #[test]
    fn test_indent_of() {
        assert_eq!(indent_of("    x = 1"), "    ");
        assert_eq!(indent_of("\t\tx"), "\t\t");
        assert_eq!(indent_of("x"), "");
    }
}
