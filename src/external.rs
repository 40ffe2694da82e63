//! External-collaborator traits (C12, SPEC_FULL.md §4.13).
//!
//! Every system this connector depends on but does not own — the object
//! store, the downstream publish sink, the structured-status sink, the
//! repository-source resolver, and the `git`/LOC/orphan-detector subprocesses
//! — is expressed as a trait here, with one default, locally-runnable
//! implementation so the crate is testable and runnable without a live
//! external service. Concrete subprocess-backed implementations of
//! `GitBinary`, `LocTool`, and `OrphanTool` live alongside the component that
//! owns them ([`crate::sync::git`], [`crate::loc`], [`crate::orphan`]);
//! grounded on the `GitManager`/`GitError` split in the teacher's
//! `sync/git.rs` and, for the trait-per-external-system shape itself, the
//! provider abstraction in `bmeddeb-gitlens`'s `providers/{github,gitlab,...}.rs`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::Event;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store I/O error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize event batch: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("source id resolution failed: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum GitBinaryError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn { command: String, #[source] source: std::io::Error },
    #[error("`{command}` exited with status {status}: {stderr}")]
    NonZeroExit { command: String, status: i32, stderr: String },
}

/// Content-addressed blob/byte store behind the cache (C7) and the default
/// publisher (C10). A trait so tests can substitute an in-memory fake instead
/// of touching disk.
pub trait ObjectStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError>;
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError>;
    fn list_shards(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError>;
}

/// Local-filesystem `ObjectStore`, rooted at `Config.git_cache_path`.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ObjectStoreError::Io { path: path.display().to_string(), source: e }),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ObjectStoreError::Io { path: parent.display().to_string(), source: e })?;
        }
        std::fs::write(&path, bytes)
            .map_err(|e| ObjectStoreError::Io { path: path.display().to_string(), source: e })
    }

    fn list_shards(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let dir = &self.root;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(dir)
            .map_err(|e| ObjectStoreError::Io { path: dir.display().to_string(), source: e })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ObjectStoreError::Io { path: dir.display().to_string(), source: e })?;
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Batches events to the downstream sink and returns the storage path the
/// batch was written under (C10, SPEC_FULL.md §4.9).
#[async_trait]
pub trait ObjectStorePublisher: Send + Sync {
    async fn publish(&self, events: &[Event], endpoint_tag: &str) -> Result<String, PublishError>;
}

/// Default implementation: newline-delimited JSON under
/// `git_cache_path/published/<endpoint_tag>-<timestamp>.ndjson`.
pub struct NdjsonPublisher {
    root: PathBuf,
}

impl NdjsonPublisher {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self { root: PathBuf::from(cache_path.into()).join("published") }
    }
}

#[async_trait]
impl ObjectStorePublisher for NdjsonPublisher {
    async fn publish(&self, events: &[Event], endpoint_tag: &str) -> Result<String, PublishError> {
        std::fs::create_dir_all(&self.root)?;
        let mut body = String::new();
        for event in events {
            body.push_str(&serde_json::to_string(event)?);
            body.push('\n');
        }
        let file_name = format!("{endpoint_tag}-{}.ndjson", events.len());
        let path = self.root.join(&file_name);
        std::fs::write(&path, body)?;
        log::info!("published {} events to {}", events.len(), path.display());
        Ok(path.display().to_string())
    }
}

/// Run status reported at the checkpoints named in SPEC_FULL.md §4.10/§7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    InProgress,
    Done,
    Failed,
}

/// Progress/status sink (C10 cross-cutting, §4.10 and §7's "user-visible
/// status"). Grounded on the `log::info!`/`log::error!` phase banners used
/// throughout the teacher's `sync/dispatcher.rs`.
pub trait StatusReporter: Send + Sync {
    fn set_status(&self, status: RunStatus, detail: Option<&str>);
    fn report_pack(&self, url: &str, new_commits: usize, date: DateTime<Utc>);
}

/// Default implementation: logs via `log`, and appends each pack report as a
/// JSON line to `git_cache_path/progress.ndjson`.
pub struct LogStatusReporter {
    progress_path: PathBuf,
}

impl LogStatusReporter {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self { progress_path: PathBuf::from(cache_path.into()).join("progress.ndjson") }
    }
}

impl StatusReporter for LogStatusReporter {
    fn set_status(&self, status: RunStatus, detail: Option<&str>) {
        match status {
            RunStatus::InProgress => log::info!("status: in_progress"),
            RunStatus::Done => log::info!("status: done"),
            RunStatus::Failed => log::error!("status: failed ({})", detail.unwrap_or("unknown error")),
        }
    }

    fn report_pack(&self, url: &str, new_commits: usize, date: DateTime<Utc>) {
        log::info!("pack flushed: {} new commits for {} as of {}", new_commits, url, date);
        let record = serde_json::json!({ "url": url, "new_commits": new_commits, "date": date });
        if let Some(parent) = self.progress_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let line = format!("{}\n", record);
        if let Err(e) = append_to_file(&self.progress_path, &line) {
            log::warn!("failed to append progress report: {e}");
        }
    }
}

fn append_to_file(path: &Path, line: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

/// Resolves a repository-source id (GitHub/Gerrit API lookup) out of scope
/// per §1; the default implementation is an identity passthrough of the
/// config-supplied id with no network call.
pub trait SourceIdResolver: Send + Sync {
    fn resolve(&self, repository_source: Option<&str>, url: &str) -> Result<Option<String>, ResolverError>;
}

pub struct PassthroughResolver {
    pub configured_id: Option<String>,
}

impl SourceIdResolver for PassthroughResolver {
    fn resolve(&self, _repository_source: Option<&str>, _url: &str) -> Result<Option<String>, ResolverError> {
        Ok(self.configured_id.clone())
    }
}

/// One raw file-change line as seen in `git log --raw --numstat` output, fed
/// to [`crate::sync::parser`] as a plain line stream so the parser's state
/// machine never depends on a process handle directly.
pub type LogLine = String;

/// Thin wrapper around the git-subprocess contracts in SPEC_FULL.md §6, so C2
/// and C9 depend on a trait rather than calling `tokio::process::Command`
/// directly — the seam the test suite substitutes a fixture-backed fake for.
#[async_trait]
pub trait GitBinary: Send + Sync {
    async fn clone_bare(&self, url: &str, dest: &Path) -> Result<(), GitBinaryError>;
    async fn fetch_prune(&self, repo: &Path) -> Result<(), GitBinaryError>;
    async fn branch_all(&self, repo: &Path) -> Result<Vec<String>, GitBinaryError>;
    async fn log(
        &self,
        repo: &Path,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<LogLine>, GitBinaryError>;
    async fn rev_list_count(&self, repo: &Path, branch: &str) -> Result<u64, GitBinaryError>;
}

/// One `{language, files, blank, comment, code}` row from the LOC tool (C5).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LanguageSummary {
    pub language: String,
    pub files: u64,
    pub blank: u64,
    pub comment: u64,
    pub code: u64,
}

/// Parsed `{ loc, pls }` response of the `gitops` helper (§6).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LocSummary {
    pub loc: u64,
    pub pls: Vec<LanguageSummary>,
}

#[async_trait]
pub trait LocTool: Send + Sync {
    async fn collect(&self, repo: &Path) -> Result<LocSummary, GitBinaryError>;
}

#[async_trait]
pub trait OrphanTool: Send + Sync {
    async fn detect(&self, repo: &Path) -> Result<Vec<String>, GitBinaryError>;
}

/// Per-commit HEAD code count via `cloc commit <sha> --json` (§6), distinct
/// from [`LocTool`]'s whole-repository `gitops` figure.
#[async_trait]
pub trait ClocTool: Send + Sync {
    async fn count(&self, repo: &Path, sha: &str) -> Result<u64, GitBinaryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_object_store_put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.put("shard-a.csv", b"hello").unwrap();
        assert_eq!(store.get("shard-a.csv").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn local_object_store_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert_eq!(store.get("missing.csv").unwrap(), None);
    }

    #[test]
    fn local_object_store_lists_shards_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.put("commits-cache-2020-first-half.csv", b"a").unwrap();
        store.put("commits-cache-2020-second-half.csv", b"b").unwrap();
        store.put("progress.ndjson", b"c").unwrap();
        let shards = store.list_shards("commits-cache-").unwrap();
        assert_eq!(shards.len(), 2);
    }

    #[test]
    fn passthrough_resolver_returns_configured_id() {
        let resolver = PassthroughResolver { configured_id: Some("src-1".to_string()) };
        assert_eq!(resolver.resolve(Some("github"), "https://x").unwrap(), Some("src-1".to_string()));
    }
}
