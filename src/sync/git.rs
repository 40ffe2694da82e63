//! Git subprocess wrapper (C9 helper, SPEC_FULL.md §4.13/§6).
//!
//! Implements the [`GitBinary`] trait by shelling out to the real `git`
//! binary with `tokio::process::Command`, exactly matching the invocations
//! in §6 (`clone --bare`, `fetch --prune`, `branch -a`,
//! `log --reverse --topo-order --raw --numstat --pretty=fuller
//! --decorate=full --parents -M -C -c`, `rev-list --count`). `LANG=C` and
//! `PAGER=""` are pinned on every invocation so output format and paging
//! never vary with the host environment. Grounded on the `GitManager`/
//! `GitError` split in the teacher's original `sync/git.rs` (mirror
//! validation via subprocess-adjacent `gix` calls), generalized here to a
//! plain subprocess wrapper per §1 ("the physical git binary... treated as
//! opaque subprocesses").

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::external::{GitBinary, GitBinaryError, LogLine};

/// Real `git` binary, invoked as an opaque subprocess.
pub struct SystemGit;

impl SystemGit {
    pub fn new() -> Self {
        Self
    }

    fn command(program: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.env("LANG", "C").env("PAGER", "");
        cmd
    }

    async fn run(mut cmd: Command, label: &str) -> Result<Vec<u8>, GitBinaryError> {
        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GitBinaryError::Spawn { command: label.to_string(), source: e })?;

        if !output.status.success() {
            return Err(GitBinaryError::NonZeroExit {
                command: label.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitBinary for SystemGit {
    async fn clone_bare(&self, url: &str, dest: &Path) -> Result<(), GitBinaryError> {
        let mut cmd = Self::command("git");
        cmd.args(["clone", "--bare", url]).arg(dest);
        Self::run(cmd, "git clone --bare").await?;
        Ok(())
    }

    async fn fetch_prune(&self, repo: &Path) -> Result<(), GitBinaryError> {
        let mut cmd = Self::command("git");
        cmd.arg("-C").arg(repo).args(["fetch", "origin", "+refs/heads/*:refs/heads/*", "--prune"]);
        Self::run(cmd, "git fetch --prune").await?;
        Ok(())
    }

    async fn branch_all(&self, repo: &Path) -> Result<Vec<String>, GitBinaryError> {
        let mut cmd = Self::command("git");
        cmd.arg("-C").arg(repo).args(["branch", "-a"]);
        let stdout = Self::run(cmd, "git branch -a").await?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(|l| l.trim_start_matches('*').trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn log(
        &self,
        repo: &Path,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<LogLine>, GitBinaryError> {
        let mut cmd = Self::command("git");
        cmd.arg("-C").arg(repo).args([
            "log",
            "--reverse",
            "--topo-order",
            "--raw",
            "--numstat",
            "--pretty=fuller",
            "--decorate=full",
            "--parents",
            "-M",
            "-C",
            "-c",
        ]);
        if let Some(since) = since {
            cmd.arg(format!("--since={}", since.to_rfc3339()));
        }
        if let Some(until) = until {
            cmd.arg(format!("--until={}", until.to_rfc3339()));
        }

        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GitBinaryError::Spawn { command: "git log".to_string(), source: e })?;

        let stdout = child.stdout.take().expect("stdout piped");
        let mut reader = BufReader::new(stdout).lines();
        let mut lines = Vec::new();
        while let Ok(Some(line)) = reader.next_line().await {
            lines.push(line);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| GitBinaryError::Spawn { command: "git log".to_string(), source: e })?;
        if !status.success() {
            return Err(GitBinaryError::NonZeroExit {
                command: "git log".to_string(),
                status: status.code().unwrap_or(-1),
                stderr: String::new(),
            });
        }
        Ok(lines)
    }

    async fn rev_list_count(&self, repo: &Path, branch: &str) -> Result<u64, GitBinaryError> {
        let mut cmd = Self::command("git");
        cmd.arg("-C").arg(repo).args(["rev-list", "--count", branch]);
        let stdout = Self::run(cmd, "git rev-list --count").await?;
        String::from_utf8_lossy(&stdout)
            .trim()
            .parse()
            .map_err(|_| GitBinaryError::NonZeroExit { command: "git rev-list --count".to_string(), status: -1, stderr: "non-numeric output".to_string() })
    }
}
