//! Git integration: each accepted fix becomes one commit in the target
//! repository's history.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::{Repository, Signature};
use tracing::debug;

use crate::heal::CommitSink;

const FALLBACK_NAME: &str = "mend";
const FALLBACK_EMAIL: &str = "mend@local";

pub struct GitCommitSink {
    repo_path: PathBuf,
}

impl GitCommitSink {
    /// Fails early when the target is not a git repository, so the healing
    /// loop can run without a sink instead of failing every commit.
    pub fn open(repo_path: &Path) -> Result<Self> {
        Repository::open(repo_path)
            .with_context(|| format!("{} is not a git repository", repo_path.display()))?;
        Ok(Self {
            repo_path: repo_path.to_path_buf(),
        })
    }

    fn signature(repo: &Repository) -> Result<Signature<'static>> {
        let config = repo.config()?;
        let name = config
            .get_string("user.name")
            .unwrap_or_else(|_| FALLBACK_NAME.to_string());
        let email = config
            .get_string("user.email")
            .unwrap_or_else(|_| FALLBACK_EMAIL.to_string());
        Ok(Signature::now(&name, &email)?)
    }
}

impl CommitSink for GitCommitSink {
    fn commit_fix(&self, file: &str, message: &str) -> Result<()> {
        let repo = Repository::open(&self.repo_path)?;

        let mut index = repo.index()?;
        index
            .add_path(Path::new(file))
            .with_context(|| format!("failed to stage {}", file))?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let sig = Self::signature(&repo)?;

        // First commit in a fresh repository has no parent
        let oid = match repo.head().ok().and_then(|h| h.peel_to_commit().ok()) {
            Some(parent) => repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?,
            None => repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?,
        };

        debug!(%file, commit = %oid, "committed fix");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_open_rejects_non_repository() {
        let dir = tempdir().unwrap();
        assert!(GitCommitSink::open(dir.path()).is_err());
    }

    #[test]
    fn test_commit_fix_creates_commit() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "tester").unwrap();
            config.set_str("user.email", "tester@local").unwrap();
        }

        fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();

        let sink = GitCommitSink::open(dir.path()).unwrap();
        sink.commit_fix("app.py", "auto-heal: fix SYNTAX in app.py:1")
            .unwrap();

        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(
            head.message().unwrap(),
            "auto-heal: fix SYNTAX in app.py:1"
        );

        fs::write(dir.path().join("app.py"), "x = 2\n").unwrap();
        sink.commit_fix("app.py", "auto-heal: fix LOGIC in app.py:1")
            .unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.parent_count(), 1);
    }
}
