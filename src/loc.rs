//! Lines-of-code collector (C5, SPEC_FULL.md §4.5/§6).
//!
//! Invokes the external `gitops` line-counting helper as an opaque
//! subprocess and parses its `{loc, pls}` JSON response, the same way the
//! teacher's `GitManager` in `src/sync/git.rs` shells out to `git` with
//! `tokio::process::Command` and maps a non-zero exit to a typed error.
//! [`ClocCommitTool`] applies the same pattern to the distinct `cloc commit
//! <sha> --json` interface (§6), whose object-keyed-by-language response
//! shape is unrelated to `gitops`'s `{loc, pls}` shape.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::LocFailureMode;
use crate::external::{ClocTool, GitBinaryError, LanguageSummary, LocSummary, LocTool};

#[derive(Debug, Error)]
pub enum LocError {
    #[error("loc tool failed: {0}")]
    Tool(#[from] GitBinaryError),
    #[error("loc tool produced malformed output: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Runs `gitops <url>` against a checked-out repository and parses its JSON
/// output. `failure_mode` controls whether a tool failure aborts the run
/// (`Fatal`) or degrades to an empty summary with a warning (`Warn`), per the
/// `--loc-tool-fatal` flag in SPEC_FULL.md §6.
pub struct GitopsLocTool {
    pub failure_mode: LocFailureMode,
}

impl GitopsLocTool {
    pub fn new(failure_mode: LocFailureMode) -> Self {
        Self { failure_mode }
    }

    async fn run(&self, repo: &Path) -> Result<LocSummary, LocError> {
        let output = Command::new("gitops")
            .arg(repo.as_os_str())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GitBinaryError::Spawn { command: "gitops".to_string(), source: e })?;

        if !output.status.success() {
            return Err(LocError::Tool(GitBinaryError::NonZeroExit {
                command: "gitops".to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }));
        }

        let raw: RawLocResponse = serde_json::from_slice(&output.stdout)?;
        Ok(LocSummary {
            loc: raw.loc,
            pls: raw
                .pls
                .into_iter()
                .map(|p| LanguageSummary { language: p.language, files: p.files, blank: p.blank, comment: p.comment, code: p.code })
                .collect(),
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawLocResponse {
    loc: u64,
    #[serde(default)]
    pls: Vec<RawLanguageEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct RawLanguageEntry {
    language: String,
    files: u64,
    blank: u64,
    comment: u64,
    code: u64,
}

#[async_trait]
impl LocTool for GitopsLocTool {
    async fn collect(&self, repo: &Path) -> Result<LocSummary, GitBinaryError> {
        match self.run(repo).await {
            Ok(summary) => Ok(summary),
            Err(e) => match self.failure_mode {
                LocFailureMode::Fatal => Err(GitBinaryError::NonZeroExit {
                    command: "gitops".to_string(),
                    status: -1,
                    stderr: e.to_string(),
                }),
                LocFailureMode::Warn => {
                    log::warn!("loc tool failed, defaulting to empty summary: {e}");
                    Ok(LocSummary::default())
                }
            },
        }
    }
}

/// Runs `cloc commit <sha> --json` against a checked-out repository and
/// extracts the `SUM.code` field — the HEAD-commit code count named
/// separately from `gitops`'s whole-repository `loc` in SPEC_FULL.md §4.4.
/// Shares `GitopsLocTool`'s fatal/warn degrade policy since both are the same
/// family of best-effort LOC tooling (§6).
pub struct ClocCommitTool {
    pub failure_mode: LocFailureMode,
}

impl ClocCommitTool {
    pub fn new(failure_mode: LocFailureMode) -> Self {
        Self { failure_mode }
    }

    async fn run(&self, repo: &Path, sha: &str) -> Result<u64, LocError> {
        let output = Command::new("cloc")
            .arg("commit")
            .arg(sha)
            .arg("--json")
            .current_dir(repo)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GitBinaryError::Spawn { command: "cloc".to_string(), source: e })?;

        if !output.status.success() {
            return Err(LocError::Tool(GitBinaryError::NonZeroExit {
                command: "cloc".to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }));
        }

        Ok(parse_cloc_sum(&output.stdout)?)
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct ClocLanguageEntry {
    #[serde(default)]
    code: u64,
}

/// `cloc commit <sha> --json`'s response is an object keyed by language name
/// plus a `"SUM"` entry holding the totals (SPEC_FULL.md §6); only the
/// summed code count is needed here.
fn parse_cloc_sum(bytes: &[u8]) -> Result<u64, serde_json::Error> {
    let raw: HashMap<String, ClocLanguageEntry> = serde_json::from_slice(bytes)?;
    Ok(raw.get("SUM").map(|e| e.code).unwrap_or(0))
}

#[async_trait]
impl ClocTool for ClocCommitTool {
    async fn count(&self, repo: &Path, sha: &str) -> Result<u64, GitBinaryError> {
        match self.run(repo, sha).await {
            Ok(count) => Ok(count),
            Err(e) => match self.failure_mode {
                LocFailureMode::Fatal => {
                    Err(GitBinaryError::NonZeroExit { command: "cloc".to_string(), status: -1, stderr: e.to_string() })
                }
                LocFailureMode::Warn => {
                    log::warn!("cloc tool failed, defaulting to 0: {e}");
                    Ok(0)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloc_sum_is_extracted_from_keyed_object() {
        let json = br#"{"Rust": {"nFiles": 3, "blank": 5, "comment": 2, "code": 113}, "SUM": {"blank": 5, "comment": 2, "code": 113, "nFiles": 3}}"#;
        assert_eq!(parse_cloc_sum(json).unwrap(), 113);
    }

    #[test]
    fn cloc_sum_defaults_to_zero_when_missing() {
        let json = br#"{"Rust": {"nFiles": 1, "blank": 0, "comment": 0, "code": 10}}"#;
        assert_eq!(parse_cloc_sum(json).unwrap(), 0);
    }

    #[test]
    fn raw_response_parses_loc_and_languages() {
        let raw: RawLocResponse =
            serde_json::from_str(r#"{"loc": 120, "pls": [{"language": "Rust", "files": 3, "blank": 5, "comment": 2, "code": 113}]}"#)
                .unwrap();
        assert_eq!(raw.loc, 120);
        assert_eq!(raw.pls.len(), 1);
        assert_eq!(raw.pls[0].language, "Rust");
    }

    #[test]
    fn raw_response_defaults_pls_when_absent() {
        let raw: RawLocResponse = serde_json::from_str(r#"{"loc": 0}"#).unwrap();
        assert!(raw.pls.is_empty());
    }
}
