//! Process-based test execution: detect the project's framework, run its
//! suite with a timeout, and parse pass/fail counts out of the summary line.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

use crate::heal::TestRunner;
use crate::model::{Framework, TestOutput};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no recognized test setup under {0}")]
    NoProject(String),
    #[error("failed to launch test command: {0}")]
    Launch(String),
}

pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Pick the test command from the project's build files. Python markers
    /// win over `package.json` when both are present.
    fn detect(&self, repo: &Path) -> Result<(Command, Framework), RunnerError> {
        const PYTHON_MARKERS: &[&str] = &[
            "pyproject.toml",
            "setup.py",
            "requirements.txt",
            "pytest.ini",
        ];

        if PYTHON_MARKERS.iter().any(|m| repo.join(m).exists()) {
            let mut cmd = Command::new("python3");
            cmd.args(["-m", "pytest", "--tb=long", "-q"]).current_dir(repo);
            return Ok((cmd, Framework::Pytest));
        }

        if repo.join("package.json").exists() {
            let framework = match std::fs::read_to_string(repo.join("package.json")) {
                Ok(manifest) if manifest.contains("\"jest\"") => Framework::Jest,
                Ok(manifest) if manifest.contains("\"mocha\"") => Framework::Mocha,
                _ => Framework::Jest,
            };
            let mut cmd = Command::new("npm");
            cmd.args(["test", "--silent"]).current_dir(repo);
            return Ok((cmd, framework));
        }

        Err(RunnerError::NoProject(repo.display().to_string()))
    }
}

impl TestRunner for ProcessRunner {
    fn run_suite(&self, repo: &Path) -> Result<TestOutput> {
        let (mut cmd, framework) = self.detect(repo)?;
        debug!(?framework, repo = %repo.display(), "running test suite");

        let result = crate::util::run_command_with_timeout(&mut cmd, self.timeout)
            .map_err(RunnerError::Launch)?;

        if result.timed_out {
            info!(timeout_secs = self.timeout.as_secs(), "test suite timed out");
            return Ok(TestOutput {
                stdout: result.stdout,
                stderr: format!(
                    "{}\ntest run exceeded {}s and was killed",
                    result.stderr,
                    self.timeout.as_secs()
                ),
                exit_code: -1,
                passed: 0,
                failed: 1,
                total: 1,
                framework,
            });
        }

        let exit_code = result.status.and_then(|s| s.code()).unwrap_or(-1);
        let combined = format!("{}\n{}", result.stdout, result.stderr);
        let (passed, failed) = parse_counts(&combined, framework);

        Ok(TestOutput {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_code,
            passed,
            failed,
            total: passed + failed,
            framework,
        })
    }
}

/// Pull `(passed, failed)` out of the framework's summary line. Collection
/// errors count as failures; unparseable output yields zero counts, which
/// the healing loop treats as a failing (empty) suite.
fn parse_counts(output: &str, framework: Framework) -> (usize, usize) {
    if framework.is_python() {
        let passed = capture_count(output, r"(\d+) passed");
        let failed = capture_count(output, r"(\d+) failed") + capture_count(output, r"(\d+) error");
        return (passed, failed);
    }

    // Jest/Mocha: "Tests: 2 failed, 3 passed, 5 total" / "3 passing, 2 failing"
    let failed =
        capture_count(output, r"(\d+) failed") + capture_count(output, r"(\d+) failing");
    let passed =
        capture_count(output, r"(\d+) passed") + capture_count(output, r"(\d+) passing");
    (passed, failed)
}

fn capture_count(output: &str, pattern: &str) -> usize {
    let re = Regex::new(pattern).expect("count pattern");
    re.captures(output)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pytest_summary() {
        let out = "........F\n1 failed, 8 passed in 0.21s\n";
        assert_eq!(parse_counts(out, Framework::Pytest), (8, 1));
    }

    #[test]
    fn test_parse_pytest_collection_error_counts_as_failure() {
        let out = "ERRORS\n1 error in 0.08s\n";
        assert_eq!(parse_counts(out, Framework::Pytest), (0, 1));
    }

    #[test]
    fn test_parse_jest_summary() {
        let out = "Tests:       2 failed, 3 passed, 5 total\n";
        assert_eq!(parse_counts(out, Framework::Jest), (3, 2));
    }

    #[test]
    fn test_parse_mocha_summary() {
        let out = "  3 passing (12ms)\n  1 failing\n";
        assert_eq!(parse_counts(out, Framework::Mocha), (3, 1));
    }

    #[test]
    fn test_unparseable_output_yields_empty_suite() {
        assert_eq!(parse_counts("garbage", Framework::Pytest), (0, 0));
    }

    #[test]
    fn test_detect_prefers_python_markers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "[project]\n").unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let (_, framework) = runner.detect(dir.path()).unwrap();
        assert_eq!(framework, Framework::Pytest);
    }

    #[test]
    fn test_detect_rejects_unknown_project() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(Duration::from_secs(5));
        assert!(runner.detect(dir.path()).is_err());
    }
}
