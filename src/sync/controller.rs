//! Sync controller (C9, SPEC_FULL.md §4.8): the main orchestrator wiring C2
//! (parser) → C4 (enricher) → C8 (dedup) → C10 (publisher) → C7 (cache),
//! barriered on C5/C6 (LOC and orphan collection).
//!
//! Grounded on `src/sync/dispatcher.rs::process_sync_job` (phase-numbered
//! async orchestrator with `log::info!` banners between phases) and
//! `parse_and_import_epochs` (sequential window iteration with
//! per-window checkpointing); the rayon-backed bounded worker pool mirrors
//! `src/sync/mod.rs::parse_all_parallel`'s `AtomicUsize` tallies, generalized
//! from parsing emails to enriching commits.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::cache::{self, CacheStore};
use crate::config::Config;
use crate::dedup::{self, DedupDecision};
use crate::enrich::{self, EnrichContext};
use crate::error::IngestError;
use crate::external::{
    ClocTool, GitBinary, GitBinaryError, LocTool, ObjectStore, ObjectStorePublisher, OrphanTool, RunStatus,
    SourceIdResolver, StatusReporter,
};
use crate::identity::derive_repository_id;
use crate::loc::{ClocCommitTool, GitopsLocTool};
use crate::models::{CacheEntry, EventAction, LastSync};
use crate::orphan::{self, ScriptOrphanTool};
use crate::publish::{self, PACK_SIZE};
use crate::sync::parser;

/// Length of the history iteration window (§4.8 step 5: "30-day windows").
const WINDOW: Duration = Duration::days(30);
const FIRST_COMMIT_LOOKBACK: Duration = Duration::seconds(60);

/// Every external collaborator the controller depends on, collected behind
/// trait objects so tests substitute fixtures for all of them at once
/// (Design Notes §9: "avoid cyclic ownership" — the controller owns these,
/// nothing else does).
pub struct Collaborators {
    pub git: Arc<dyn GitBinary>,
    pub loc_tool: Arc<GitopsLocTool>,
    pub cloc_tool: Arc<ClocCommitTool>,
    pub orphan_tool: Arc<ScriptOrphanTool>,
    pub resolver: Arc<dyn SourceIdResolver>,
    pub publisher: Arc<dyn ObjectStorePublisher>,
    pub status: Arc<dyn StatusReporter>,
    pub object_store: Arc<dyn ObjectStore>,
}

/// Summary returned to `main()` once a run completes.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct SyncController {
    config: Config,
    collaborators: Collaborators,
}

impl SyncController {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self { config, collaborators }
    }

    fn repo_path(&self) -> PathBuf {
        let sanitized: String = self
            .config
            .git_url
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Path::new(&self.config.git_repos_path).join(sanitized)
    }

    fn last_sync_key(&self) -> String {
        let tag = self.config.git_stream.as_deref().unwrap_or(&self.config.git_url);
        format!("last_sync-{}.json", tag.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect::<String>())
    }

    fn load_last_sync(&self) -> Result<Option<LastSync>, IngestError> {
        let bytes = self.collaborators.object_store.get(&self.last_sync_key())?;
        Ok(bytes.and_then(|b| serde_json::from_slice(&b).ok()))
    }

    fn save_last_sync(&self, state: &LastSync) -> Result<(), IngestError> {
        let bytes = serde_json::to_vec_pretty(state).expect("LastSync always serializes");
        self.collaborators.object_store.put(&self.last_sync_key(), &bytes)?;
        Ok(())
    }

    /// Main entry point: runs the full protocol in §4.8 and returns a
    /// summary of what was emitted.
    pub async fn run(&self) -> Result<RunSummary, IngestError> {
        self.collaborators.status.set_status(RunStatus::InProgress, None);
        match self.run_inner().await {
            Ok(summary) => {
                self.collaborators.status.set_status(RunStatus::Done, None);
                Ok(summary)
            }
            Err(e) => {
                self.collaborators.status.set_status(RunStatus::Failed, Some(&e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_inner(&self) -> Result<RunSummary, IngestError> {
        let repo = self.repo_path();

        // Step 2: prepare repository.
        if !repo.exists() {
            log::info!("cloning {} into {}", self.config.git_url, repo.display());
            self.collaborators.git.clone_bare(&self.config.git_url, &repo).await?;
        } else {
            log::info!("fetching updates for {}", self.config.git_url);
            self.collaborators.git.fetch_prune(&repo).await?;
        }

        let branches = self.collaborators.git.branch_all(&repo).await?;
        let default_branch = determine_default_branch(&branches);
        log::info!("default branch resolved to {default_branch}");

        let source_type = enrich::source_type_for_origin(&self.config.git_url);

        // Step 1: resolve date range. A single unbounded log pass discovers
        // the repository's extent (first commit, HEAD) up front.
        let last_sync = self.load_last_sync()?;
        let (first_commit_at, head_sha, head_author_date) = self.discover_bounds(&repo).await?;

        let from = if let Some(env_last_sync) = std::env::var("LAST_SYNC").ok().and_then(|s| s.parse::<DateTime<Utc>>().ok()) {
            env_last_sync
        } else if let Some(state) = &last_sync {
            state.last_sync
        } else {
            first_commit_at - FIRST_COMMIT_LOOKBACK
        };
        let to = head_author_date;
        let resuming = last_sync.is_some();

        log::info!("syncing {} from {} to {}", self.config.git_url, from, to);

        let commit_count = self.collaborators.git.rev_list_count(&repo, &default_branch).await?;

        // Step 3: launch C5/C6 in the background.
        let loc_handle = {
            let loc_tool = Arc::clone(&self.collaborators.loc_tool);
            let repo = repo.clone();
            tokio::spawn(async move { loc_tool.collect(&repo).await })
        };
        let orphan_handle = {
            let orphan_tool = Arc::clone(&self.collaborators.orphan_tool);
            let repo = repo.clone();
            tokio::spawn(async move { orphan_tool.detect(&repo).await })
        };
        let cloc_handle = {
            let cloc_tool = Arc::clone(&self.collaborators.cloc_tool);
            let repo = repo.clone();
            let head_sha = head_sha.clone();
            tokio::spawn(async move { cloc_tool.count(&repo, &head_sha).await })
        };

        // Step 4: resolve source id (no-op for the passthrough default).
        // Resolution failure is non-fatal (§1: the source-id lookup is an
        // external enrichment, not load-bearing for ingestion itself).
        let source_id = match self
            .collaborators
            .resolver
            .resolve(self.config.git_repository_source.as_deref(), &self.config.git_url)
        {
            Ok(id) => id,
            Err(e) => {
                log::warn!("source id resolution failed, continuing without it: {e}");
                None
            }
        };
        let repository_id = derive_repository_id(source_id.as_deref().or(self.config.git_source_id.as_deref()), &self.config.git_url, source_type);

        // Step 6 barrier: LOC and orphan sets must be known before any
        // commit leaves the enricher. A panicked/cancelled background task
        // surfaces as the same `GitBinaryError::Spawn` kind a failed
        // subprocess would.
        let loc_summary = join_spawned("loc collector", loc_handle).await?;
        let orphan_shas: HashSet<String> = join_spawned("orphan detector", orphan_handle).await?.into_iter().collect();
        let head_cloc = join_spawned("cloc counter", cloc_handle).await?;

        let mut cache = CacheStore::open(Arc::clone(&self.collaborators.object_store), commit_count, resuming)?;
        let created_ids: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(cache.entity_ids()));

        if cache.is_hot() {
            let spanned = cache::shard_range(from, to);
            log::debug!("hot repo spans {} half-year shard(s) for this run's window", spanned.len());
        }

        let counters = Counters::default();
        let mut pending_events = Vec::new();
        let mut pending_hashes = Vec::new();

        // `thrN` (Config.thread_count) bounds the enrichment worker pool;
        // dedup/cache below stays single-threaded regardless.
        let enrich_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.thread_count)
            .build()
            .map_err(|e| {
                IngestError::Git(GitBinaryError::Spawn {
                    command: "rayon enrich pool".to_string(),
                    source: std::io::Error::other(e.to_string()),
                })
            })?;

        // Step 5: iterate history in 30-day windows.
        let mut window_start = from;
        while window_start < to {
            let window_end = std::cmp::min(window_start + WINDOW, to);
            let lines = self.collaborators.git.log(&repo, Some(window_start), Some(window_end)).await?;

            let mut window_commits: Vec<_> = parser::parse(lines.into_iter())
                .filter_map(|r| match r {
                    Ok(commit) => Some(commit),
                    Err(e) => {
                        log::error!("fatal parse error in window {window_start}..{window_end}: {e}");
                        None
                    }
                })
                .collect();
            // §5 ordering: reverse the ascending window so overall order is
            // descending within the window.
            window_commits.reverse();

            // Enrichment (C4) is a pure function of (raw commit, context), so
            // it runs across `thrN` rayon workers; dedup/cache mutation below
            // stays sequential in window order since the "already created?"
            // check and cache shard writes are stateful.
            let enriched_in_order: Vec<(String, Result<crate::models::EnrichedCommit, enrich::EnrichError>)> = enrich_pool
                .install(|| {
                    window_commits
                        .par_iter()
                        .map(|raw| {
                            let sha = raw.sha.clone();
                            let is_head = sha == head_sha;
                            let ctx = EnrichContext {
                                repository_id: repository_id.clone(),
                                url: self.config.git_url.clone(),
                                default_branch: default_branch.clone(),
                                orphan_shas: &orphan_shas,
                                head_loc: is_head.then_some(loc_summary.loc),
                                head_cloc: is_head.then_some(head_cloc),
                                languages: loc_summary.pls.clone(),
                            };
                            (sha, enrich::enrich(raw, &ctx))
                        })
                        .collect()
                });

            for (sha, result) in enriched_in_order {
                let enriched = match result {
                    Ok(e) => e,
                    Err(e) => {
                        log::warn!("skipping commit {sha}: {e}");
                        counters.errors.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                };

                cache.ensure_shard_for(enriched.committed_timestamp, resuming)?;

                let hash = dedup::content_hash(&self.config.git_url, &enriched);
                let already_created = created_ids.lock().contains(&enriched.id);
                let decision = dedup::decide(cache.contains_hash(&hash), already_created);

                match decision {
                    DedupDecision::Skip => {
                        cache.clear_orphaned(&hash);
                        counters.skipped.fetch_add(1, Ordering::Relaxed);
                    }
                    DedupDecision::Create => {
                        created_ids.lock().insert(enriched.id.clone());
                        let entry = cache_entry_for(&hash, &enriched, cache.is_hot());
                        cache.insert(entry);
                        pending_hashes.push(hash);
                        pending_events.push(publish::envelope(EventAction::Created, source_type, enriched));
                        counters.created.fetch_add(1, Ordering::Relaxed);
                    }
                    DedupDecision::Update => {
                        let entry = cache_entry_for(&hash, &enriched, cache.is_hot());
                        cache.insert_update(entry);
                        pending_hashes.push(hash);
                        pending_events.push(publish::envelope(EventAction::Updated, source_type, enriched));
                        counters.updated.fetch_add(1, Ordering::Relaxed);
                    }
                }

                if pending_events.len() >= PACK_SIZE {
                    self.flush_pack(&mut cache, &mut pending_events, &mut pending_hashes).await?;
                }
            }

            window_start = window_end;
        }

        if !pending_events.is_empty() {
            self.flush_pack(&mut cache, &mut pending_events, &mut pending_hashes).await?;
        }

        // Step 9: final reconciliation.
        if resuming {
            self.reconcile_orphans(&mut cache, source_type, &orphan_shas).await?;
        }

        cache.flush()?;

        // Step 10: persist new last_sync. Open Question (SPEC_FULL.md §9):
        // adopted gating the watermark on a clean run rather than letting it
        // advance past commits that failed enrichment — if any commit in this
        // run was skipped, the watermark stays at `from` so the next run
        // retries the same window instead of silently skipping past it.
        let new_watermark = if counters.errors.load(Ordering::Relaxed) == 0 { to } else { from };
        self.save_last_sync(&LastSync {
            last_sync: new_watermark,
            head: head_sha,
            target: commit_count,
            total: last_sync.map(|s| s.total).unwrap_or(0) + counters.created.load(Ordering::Relaxed) as u64,
            first_commit_at: Some(first_commit_at),
        })?;

        Ok(RunSummary {
            created: counters.created.load(Ordering::Relaxed),
            updated: counters.updated.load(Ordering::Relaxed),
            skipped: counters.skipped.load(Ordering::Relaxed),
            errors: counters.errors.load(Ordering::Relaxed),
        })
    }

    async fn flush_pack(
        &self,
        cache: &mut CacheStore,
        events: &mut Vec<crate::models::Event>,
        hashes: &mut Vec<String>,
    ) -> Result<(), IngestError> {
        if events.is_empty() {
            return Ok(());
        }
        let endpoint_tag = self.config.git_stream.clone().unwrap_or_else(|| "default".to_string());
        let drained_events = std::mem::take(events);
        let drained_hashes = std::mem::take(hashes);
        let event_packs = publish::into_packs(drained_events);
        let hash_packs = drained_hashes.chunks(PACK_SIZE);
        for (pack, hash_pack) in event_packs.iter().zip(hash_packs) {
            let path = self.collaborators.publisher.publish(pack, &endpoint_tag).await?;
            cache.stamp_file_location(hash_pack, &path);
            self.collaborators.status.report_pack(&self.config.git_url, pack.len(), Utc::now());
        }
        cache.flush()?;
        Ok(())
    }

    /// Re-publish every cache entry still marked `orphaned=true` after this
    /// run re-emitted everything it saw (§4.8 step 9). Cold repos retain the
    /// full payload in `content` and can republish it verbatim; hot repos
    /// omit `content` (§4.6), so reconciliation there only updates the
    /// cache record — the open question in SPEC_FULL.md §9 treats this as
    /// informational and out of scope for a full payload replay.
    async fn reconcile_orphans(
        &self,
        cache: &mut CacheStore,
        source_type: &str,
        orphan_shas: &HashSet<String>,
    ) -> Result<(), IngestError> {
        // Intersect the orphan detector's output against what the cache
        // actually holds (by source sha) before falling back to whatever the
        // resuming-load-forced-orphaned heuristic already caught.
        let cached_shas = cache.source_entity_ids();
        let detected: Vec<String> = orphan_shas.iter().cloned().collect();
        for sha in orphan::reconcile(&detected, &cached_shas) {
            cache.mark_orphaned_by_source_id(&sha);
        }

        let still_orphaned = cache.still_orphaned();
        if still_orphaned.is_empty() {
            return Ok(());
        }
        log::info!("reconciling {} orphaned cache entries", still_orphaned.len());

        let mut events = Vec::new();
        let mut hashes = Vec::new();
        for entry in still_orphaned {
            if entry.content.is_empty() {
                log::warn!("cache entry {} has no retained payload (hot repo); marking orphaned without republish", entry.entity_id);
                continue;
            }
            let Ok(decoded) = base64_decode(&entry.content) else { continue };
            let Ok(mut payload) = serde_json::from_slice::<crate::models::EnrichedCommit>(&decoded) else { continue };
            payload.orphaned = true;
            hashes.push(entry.hash.clone());
            events.push(publish::envelope(EventAction::Updated, source_type, payload));
        }

        if !events.is_empty() {
            let endpoint_tag = self.config.git_stream.clone().unwrap_or_else(|| "default".to_string());
            let path = self.collaborators.publisher.publish(&events, &endpoint_tag).await?;
            cache.stamp_file_location(&hashes, &path);
        }
        Ok(())
    }

    /// One unbounded `git log` pass to establish the repository's extent:
    /// the earliest commit's author date, and HEAD's sha/author date (the
    /// last commit `--reverse --topo-order` yields).
    async fn discover_bounds(&self, repo: &Path) -> Result<(DateTime<Utc>, String, DateTime<Utc>), IngestError> {
        let lines = self.collaborators.git.log(repo, None, None).await?;
        let mut first: Option<DateTime<Utc>> = None;
        let mut head_sha = String::new();
        let mut head_date = Utc::now();
        for result in parser::parse(lines.into_iter()) {
            let commit = result?;
            if let Some(date) = commit.author_date {
                let utc = date.with_timezone(&Utc);
                if first.is_none() {
                    first = Some(utc);
                }
                head_sha = commit.sha;
                head_date = utc;
            }
        }
        Ok((first.unwrap_or_else(Utc::now), head_sha, head_date))
    }
}

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    updated: AtomicUsize,
    skipped: AtomicUsize,
    errors: AtomicUsize,
}

fn determine_default_branch(branches: &[String]) -> String {
    let normalize = |b: &str| b.trim_start_matches("remotes/origin/").trim_start_matches("origin/").to_string();
    let normalized: Vec<String> = branches.iter().map(|b| normalize(b)).collect();
    if normalized.iter().any(|b| b == "main") {
        return "main".to_string();
    }
    if normalized.iter().any(|b| b == "master") {
        return "master".to_string();
    }
    normalized.into_iter().next().unwrap_or_else(|| "main".to_string())
}

fn cache_entry_for(hash: &str, commit: &crate::models::EnrichedCommit, hot: bool) -> CacheEntry {
    let content = if hot {
        String::new()
    } else {
        base64_encode(&serde_json::to_vec(commit).expect("EnrichedCommit always serializes"))
    };
    CacheEntry {
        timestamp: Utc::now(),
        entity_id: commit.id.clone(),
        source_entity_id: commit.sha.clone(),
        file_location: String::new(),
        hash: hash.to_string(),
        orphaned: false,
        from_dl: false,
        content,
        commit_date: commit.committed_timestamp,
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(text)
}

/// Collapses a `tokio::spawn` handle's two failure layers (task join, inner
/// result) into the single `GitBinaryError` kind a failed subprocess would
/// have produced directly, so callers see one `?`.
async fn join_spawned<T>(label: &str, handle: tokio::task::JoinHandle<Result<T, GitBinaryError>>) -> Result<T, IngestError> {
    match handle.await {
        Ok(inner) => Ok(inner?),
        Err(e) => Err(IngestError::Git(GitBinaryError::Spawn { command: label.to_string(), source: std::io::Error::other(e.to_string()) })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_branch_prefers_main() {
        let branches = vec!["origin/develop".to_string(), "origin/main".to_string()];
        assert_eq!(determine_default_branch(&branches), "main");
    }

    #[test]
    fn default_branch_falls_back_to_master() {
        let branches = vec!["origin/master".to_string(), "origin/feature".to_string()];
        assert_eq!(determine_default_branch(&branches), "master");
    }

    #[test]
    fn default_branch_falls_back_to_first_when_neither_present() {
        let branches = vec!["origin/trunk".to_string()];
        assert_eq!(determine_default_branch(&branches), "trunk");
    }
}
