//! Orphan detector (C6, SPEC_FULL.md §4.6/§6).
//!
//! Shells out to `detect-removed-commits.sh` the same way the teacher's
//! `GitManager` shells out to `git`, and turns its whitespace-separated SHA
//! list into a set the cache reconciliation step (C9) can intersect against
//! cached hashes.

use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::external::{GitBinaryError, OrphanTool};

#[derive(Debug, Error)]
pub enum OrphanError {
    #[error("orphan detector failed: {0}")]
    Tool(#[from] GitBinaryError),
}

/// Runs `detect-removed-commits.sh` against a bare repository and returns
/// the SHAs of commits it reports as removed from history (force-pushes,
/// rebases) since the last sync.
pub struct ScriptOrphanTool;

impl ScriptOrphanTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScriptOrphanTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrphanTool for ScriptOrphanTool {
    async fn detect(&self, repo: &Path) -> Result<Vec<String>, GitBinaryError> {
        let output = Command::new("detect-removed-commits.sh")
            .arg(repo.as_os_str())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GitBinaryError::Spawn { command: "detect-removed-commits.sh".to_string(), source: e })?;

        if !output.status.success() {
            return Err(GitBinaryError::NonZeroExit {
                command: "detect-removed-commits.sh".to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.split_whitespace().map(str::to_string).collect())
    }
}

/// Intersects the detector's output against the still-cached hashes from a
/// prior run, producing the set a reconciliation pass must re-publish as
/// `commit.updated` with a tombstone (§4.8 step 9).
pub fn reconcile(detected: &[String], cached_hashes: &HashSet<String>) -> Vec<String> {
    detected.iter().filter(|sha| cached_hashes.contains(sha.as_str())).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_keeps_only_hashes_present_in_cache() {
        let cached: HashSet<String> = ["a", "b"].into_iter().map(str::to_string).collect();
        let detected = vec!["a".to_string(), "c".to_string()];
        let result = reconcile(&detected, &cached);
        assert_eq!(result, vec!["a".to_string()]);
    }

    #[test]
    fn reconcile_empty_detection_yields_empty_result() {
        let cached: HashSet<String> = ["a"].into_iter().map(str::to_string).collect();
        assert!(reconcile(&[], &cached).is_empty());
    }
}
