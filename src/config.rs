//! Healing policy knobs, optionally loaded from a `mend.toml` at the target
//! repository root.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const POLICY_FILE: &str = "mend.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Maximum test-and-repair rounds per run.
    pub max_iterations: u32,
    /// Wall-clock budget for one suite execution.
    pub test_timeout_secs: u64,
    /// How many characters of combined test output each iteration keeps.
    pub output_capture_chars: usize,
    /// Cap on defects admitted from location-less fallback classification.
    pub max_unlocated_defects: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            test_timeout_secs: 120,
            output_capture_chars: 2000,
            max_unlocated_defects: 10,
        }
    }
}

impl Policy {
    /// Load the policy file from the target repository, or fall back to
    /// defaults. A corrupt file is reported and ignored rather than fatal.
    pub fn load(repo_root: &Path) -> Self {
        let path = repo_root.join(POLICY_FILE);
        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str(&content) {
            Ok(policy) => policy,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring corrupt policy file");
                Self::default()
            }
        }
    }
}
