//! Run record persistence: one pretty-printed JSON document per healing
//! session, written after the run finishes (whatever its outcome).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::model::Run;

pub fn save(run: &Run, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(run).context("failed to serialize run record")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "run record saved");
    Ok(())
}

pub fn load(path: &Path) -> Result<Run> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid run record", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefectKind, Fix, FixStatus, RunStatus};
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports/results.json");

        let mut run = Run::new("/tmp/project");
        run.status = RunStatus::Passed;
        run.total_commits = 1;
        run.fixes.push(Fix {
            file: "app.py".to_string(),
            line: 3,
            kind: DefectKind::Syntax,
            before: "def f()".to_string(),
            after: "def f():".to_string(),
            commit_message: "auto-heal: fix SYNTAX in app.py:3".to_string(),
            status: FixStatus::Verified,
        });

        save(&run, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.status, RunStatus::Passed);
        assert_eq!(loaded.fixes.len(), 1);
        assert_eq!(loaded.fixes[0].status, FixStatus::Verified);
    }

    #[test]
    fn test_load_rejects_invalid_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_err());
    }
}
