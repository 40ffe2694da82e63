//! Cache store (C7, SPEC_FULL.md §4.6).
//!
//! A content-addressed key-value store keyed by payload hash, materialized as
//! CSV files behind the [`ObjectStore`] trait. Grounded on the teacher's
//! `MailingListCache` (`src/threading/cache/mailing_list_cache.rs`): a
//! `DashMap`-backed in-memory map guarded by an `Arc`, a `CACHE_VERSION`
//! constant, and `load_from_disk`/`save_to_disk` methods — with bincode
//! swapped for hand-rolled CSV, since the spec fixes a textual schema an
//! external object store must also be able to read, and no pack repository
//! depends on the `csv` crate.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use dashmap::DashMap;
use thiserror::Error;

use crate::external::{ObjectStore, ObjectStoreError};
use crate::models::CacheEntry;

pub const HOT_REPO_THRESHOLD: u64 = 50_000;
const CSV_HEADER: &str = "timestamp,entity_id,source_entity_id,file_location,hash,orphaned,from_dl,content,commit_date";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("object store error: {0}")]
    Store(#[from] ObjectStoreError),
    #[error("malformed cache row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
}

/// Calendar half-year a commit falls into, used as the shard key for hot
/// repositories (Glossary: "Shard").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardKey {
    pub year: i32,
    pub first_half: bool,
}

impl ShardKey {
    pub fn for_date(date: chrono::DateTime<Utc>) -> Self {
        Self { year: date.year(), first_half: date.month() <= 6 }
    }

    pub fn file_name(self) -> String {
        format!(
            "commits-cache-{}-{}.csv",
            self.year,
            if self.first_half { "first-half" } else { "second-half" }
        )
    }

    fn single_file_name() -> &'static str {
        "commits-cache.csv"
    }
}

/// One shard's worth of cache rows, held in memory while it is active.
struct Shard {
    key: Option<ShardKey>,
    entries: Arc<DashMap<String, CacheEntry>>,
    retain_content: bool,
    dirty: bool,
}

impl Shard {
    fn empty(key: Option<ShardKey>, retain_content: bool) -> Self {
        Self { key, entries: Arc::new(DashMap::new()), retain_content, dirty: false }
    }

    fn file_name(&self) -> String {
        match self.key {
            Some(k) => k.file_name(),
            None => ShardKey::single_file_name().to_string(),
        }
    }
}

/// The hot/cold cache store: loads and persists shards via an [`ObjectStore`],
/// forces `orphaned=true` on load when resuming a prior run, and tracks the
/// secondary update-cache (`commits-update-cache.csv`) alongside the primary.
pub struct CacheStore {
    store: Arc<dyn ObjectStore>,
    hot: bool,
    active: Shard,
    update_cache: Arc<DashMap<String, CacheEntry>>,
    update_cache_dirty: bool,
}

impl CacheStore {
    /// Open (or initialize) the cache for a repository with `commit_count`
    /// commits. `resuming` is true whenever a prior `LAST_SYNC` exists, which
    /// forces every loaded entry's `orphaned` flag to `true` pending this
    /// run's reconciliation (§4.6 invariants).
    pub fn open(store: Arc<dyn ObjectStore>, commit_count: u64, resuming: bool) -> Result<Self, CacheError> {
        let hot = commit_count >= HOT_REPO_THRESHOLD;
        let update_cache = Arc::new(DashMap::new());
        for entry in load_csv(store.as_ref(), "commits-update-cache.csv")? {
            update_cache.insert(entry.hash.clone(), entry);
        }

        let active = if hot {
            Shard::empty(None, false)
        } else {
            let mut shard = Shard::empty(None, true);
            for mut entry in load_csv(store.as_ref(), ShardKey::single_file_name())? {
                if resuming {
                    entry.orphaned = true;
                }
                shard.entries.insert(entry.hash.clone(), entry);
            }
            shard
        };

        Ok(Self { store, hot, active, update_cache, update_cache_dirty: false })
    }

    pub fn is_hot(&self) -> bool {
        self.hot
    }

    /// Ensure the shard covering `date` is the active one, flushing and
    /// persisting the previous shard first if a boundary was crossed
    /// (§4.6 Sharding).
    pub fn ensure_shard_for(&mut self, date: chrono::DateTime<Utc>, resuming: bool) -> Result<(), CacheError> {
        if !self.hot {
            return Ok(());
        }
        let key = ShardKey::for_date(date);
        if self.active.key == Some(key) {
            return Ok(());
        }
        self.flush_active()?;
        let mut shard = Shard::empty(Some(key), false);
        for mut entry in load_csv(self.store.as_ref(), &key.file_name())? {
            if resuming {
                entry.orphaned = true;
            }
            shard.entries.insert(entry.hash.clone(), entry);
        }
        self.active = shard;
        Ok(())
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.active.entries.contains_key(hash)
    }

    pub fn get(&self, hash: &str) -> Option<CacheEntry> {
        self.active.entries.get(hash).map(|e| e.clone())
    }

    /// Snapshot of every `entity_id` already known to this cache (active
    /// shard plus the update cache), used by the controller to seed its
    /// "previously created?" check in the dedup decision table (§4.7).
    pub fn entity_ids(&self) -> std::collections::HashSet<String> {
        self.active
            .entries
            .iter()
            .map(|e| e.entity_id.clone())
            .chain(self.update_cache.iter().map(|e| e.entity_id.clone()))
            .collect()
    }

    pub fn insert(&mut self, entry: CacheEntry) {
        self.active.entries.insert(entry.hash.clone(), entry);
        self.active.dirty = true;
    }

    pub fn insert_update(&mut self, entry: CacheEntry) {
        self.update_cache.insert(entry.hash.clone(), entry);
        self.update_cache_dirty = true;
    }

    pub fn clear_orphaned(&mut self, hash: &str) {
        if let Some(mut entry) = self.active.entries.get_mut(hash) {
            entry.orphaned = false;
            self.active.dirty = true;
        }
    }

    /// Every `source_entity_id` (commit sha) this cache currently holds an
    /// entry for, across the active shard and the update cache — the set the
    /// orphan detector's output is intersected against during reconciliation
    /// (§4.8 step 9, [`crate::orphan::reconcile`]).
    pub fn source_entity_ids(&self) -> std::collections::HashSet<String> {
        self.active
            .entries
            .iter()
            .map(|e| e.source_entity_id.clone())
            .chain(self.update_cache.iter().map(|e| e.source_entity_id.clone()))
            .collect()
    }

    /// Force `orphaned = true` on every entry whose `source_entity_id`
    /// matches `sha`, wherever it lives (active shard or update cache).
    pub fn mark_orphaned_by_source_id(&mut self, sha: &str) {
        for mut entry in self.active.entries.iter_mut() {
            if entry.source_entity_id == sha {
                entry.orphaned = true;
                self.active.dirty = true;
            }
        }
        for mut entry in self.update_cache.iter_mut() {
            if entry.source_entity_id == sha {
                entry.orphaned = true;
                self.update_cache_dirty = true;
            }
        }
    }

    /// Stamp the publisher-returned storage path onto every entry of the
    /// given hashes (step 7 of the sync controller's protocol).
    pub fn stamp_file_location(&mut self, hashes: &[String], file_location: &str) {
        for hash in hashes {
            if let Some(mut entry) = self.active.entries.get_mut(hash) {
                entry.file_location = file_location.to_string();
                self.active.dirty = true;
            }
            if let Some(mut entry) = self.update_cache.get_mut(hash) {
                entry.file_location = file_location.to_string();
                self.update_cache_dirty = true;
            }
        }
    }

    /// Entries still marked `orphaned=true` after this run re-emitted every
    /// commit it saw — candidates for final reconciliation (§4.8 step 9).
    pub fn still_orphaned(&self) -> Vec<CacheEntry> {
        self.active.entries.iter().filter(|e| e.orphaned).map(|e| e.clone()).collect()
    }

    pub fn flush_active(&mut self) -> Result<(), CacheError> {
        if !self.active.dirty {
            return Ok(());
        }
        let bytes = render_csv(&self.active.entries, self.active.retain_content);
        self.store.put(&self.active.file_name(), bytes.as_bytes())?;
        self.active.dirty = false;
        Ok(())
    }

    pub fn flush_updates(&mut self) -> Result<(), CacheError> {
        if !self.update_cache_dirty {
            return Ok(());
        }
        let bytes = render_csv(&self.update_cache, true);
        self.store.put("commits-update-cache.csv", bytes.as_bytes())?;
        self.update_cache_dirty = false;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CacheError> {
        self.flush_active()?;
        self.flush_updates()
    }
}

fn load_csv(store: &dyn ObjectStore, key: &str) -> Result<Vec<CacheEntry>, CacheError> {
    let Some(bytes) = store.get(key)? else {
        return Ok(Vec::new());
    };
    let text = String::from_utf8_lossy(&bytes);
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if idx == 0 || line.trim().is_empty() {
            continue;
        }
        rows.push(parse_row(idx, line)?);
    }
    Ok(rows)
}

fn parse_row(line_no: usize, line: &str) -> Result<CacheEntry, CacheError> {
    let fields: Vec<String> = split_csv_line(line);
    if fields.len() != 9 {
        return Err(CacheError::MalformedRow {
            line: line_no,
            reason: format!("expected 9 columns, found {}", fields.len()),
        });
    }
    let parse_ts = |s: &str| -> Result<chrono::DateTime<Utc>, CacheError> {
        s.parse().map_err(|_| CacheError::MalformedRow { line: line_no, reason: format!("bad timestamp {s:?}") })
    };
    Ok(CacheEntry {
        timestamp: parse_ts(&fields[0])?,
        entity_id: unescape(&fields[1]),
        source_entity_id: unescape(&fields[2]),
        file_location: unescape(&fields[3]),
        hash: unescape(&fields[4]),
        orphaned: fields[5] == "true",
        from_dl: fields[6] == "true",
        content: unescape(&fields[7]),
        commit_date: parse_ts(&fields[8])?,
    })
}

fn render_csv(entries: &DashMap<String, CacheEntry>, retain_content: bool) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    let mut rows: Vec<_> = entries.iter().map(|e| e.clone()).collect();
    rows.sort_by(|a, b| a.hash.cmp(&b.hash));
    for entry in rows {
        out.push_str(&escape(&entry.timestamp.to_rfc3339()));
        out.push(',');
        out.push_str(&escape(&entry.entity_id));
        out.push(',');
        out.push_str(&escape(&entry.source_entity_id));
        out.push(',');
        out.push_str(&escape(&entry.file_location));
        out.push(',');
        out.push_str(&escape(&entry.hash));
        out.push(',');
        out.push_str(if entry.orphaned { "true" } else { "false" });
        out.push(',');
        out.push_str(if entry.from_dl { "true" } else { "false" });
        out.push(',');
        out.push_str(&escape(if retain_content { &entry.content } else { "" }));
        out.push(',');
        out.push_str(&escape(&entry.commit_date.to_rfc3339()));
        out.push('\n');
    }
    out
}

fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn unescape(field: &str) -> String {
    if field.starts_with('"') && field.ends_with('"') && field.len() >= 2 {
        field[1..field.len() - 1].replace("\"\"", "\"")
    } else {
        field.to_string()
    }
}

/// Split one CSV row into its raw (still-escaped) fields, respecting quoted
/// fields that may themselves contain commas (e.g. a `file_location` path).
/// Unescaping of `""` -> `"` happens afterward in [`unescape`].
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                field.push('"');
                chars.next();
            }
            '"' => {
                in_quotes = !in_quotes;
                field.push('"');
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Enumerate the half-year shard keys a date range spans (used by the sync
/// controller to predict shard file names up front for hot repos).
pub fn shard_range(first: chrono::DateTime<Utc>, last: chrono::DateTime<Utc>) -> Vec<ShardKey> {
    let mut keys = Vec::new();
    let mut cursor = NaiveDate::from_ymd_opt(first.year(), if first.month() <= 6 { 1 } else { 7 }, 1).unwrap();
    let end_year = last.year();
    let end_first_half = last.month() <= 6;
    loop {
        let key = ShardKey { year: cursor.year(), first_half: cursor.month() <= 6 };
        keys.push(key);
        if key.year == end_year && key.first_half == end_first_half {
            break;
        }
        cursor = if key.first_half {
            NaiveDate::from_ymd_opt(cursor.year(), 7, 1).unwrap()
        } else {
            NaiveDate::from_ymd_opt(cursor.year() + 1, 1, 1).unwrap()
        };
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::LocalObjectStore;
    use chrono::TimeZone;

    fn sample_entry(hash: &str, commit_date: chrono::DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            entity_id: "entity-1".to_string(),
            source_entity_id: "abc123".to_string(),
            file_location: "".to_string(),
            hash: hash.to_string(),
            orphaned: false,
            from_dl: false,
            content: "eyJrIjoidiJ9".to_string(),
            commit_date,
        }
    }

    #[test]
    fn cold_repo_uses_single_shard_file() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()));
        let mut cache = CacheStore::open(store.clone(), 10, false).unwrap();
        assert!(!cache.is_hot());
        cache.insert(sample_entry("h1", Utc.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap()));
        cache.flush().unwrap();
        assert_eq!(store.list_shards("commits-cache").unwrap(), vec!["commits-cache.csv"]);
    }

    #[test]
    fn hot_repo_shards_by_half_year() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()));
        let mut cache = CacheStore::open(store.clone(), 60_000, false).unwrap();
        assert!(cache.is_hot());

        cache.ensure_shard_for(Utc.with_ymd_and_hms(2019, 2, 1, 0, 0, 0).unwrap(), false).unwrap();
        cache.insert(sample_entry("h1", Utc.with_ymd_and_hms(2019, 2, 1, 0, 0, 0).unwrap()));

        cache.ensure_shard_for(Utc.with_ymd_and_hms(2019, 9, 1, 0, 0, 0).unwrap(), false).unwrap();
        cache.insert(sample_entry("h2", Utc.with_ymd_and_hms(2019, 9, 1, 0, 0, 0).unwrap()));
        cache.flush().unwrap();

        let shards = store.list_shards("commits-cache-").unwrap();
        assert!(shards.contains(&"commits-cache-2019-first-half.csv".to_string()));
        assert!(shards.contains(&"commits-cache-2019-second-half.csv".to_string()));
    }

    #[test]
    fn resuming_run_forces_orphaned_true_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()));
        {
            let mut cache = CacheStore::open(store.clone(), 10, false).unwrap();
            cache.insert(sample_entry("h1", Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()));
            cache.flush().unwrap();
        }
        let cache = CacheStore::open(store.clone(), 10, true).unwrap();
        let entry = cache.get("h1").unwrap();
        assert!(entry.orphaned);
    }

    #[test]
    fn csv_round_trips_through_escaping() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()));
        let mut cache = CacheStore::open(store.clone(), 10, false).unwrap();
        let mut entry = sample_entry("h1", Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        entry.file_location = "path, with, commas".to_string();
        cache.insert(entry);
        cache.flush().unwrap();

        let reloaded = CacheStore::open(store, 10, false).unwrap();
        assert_eq!(reloaded.get("h1").unwrap().file_location, "path, with, commas");
    }

    #[test]
    fn shard_range_spans_expected_half_years() {
        let first = Utc.with_ymd_and_hms(2019, 3, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2020, 8, 1, 0, 0, 0).unwrap();
        let keys = shard_range(first, last);
        assert_eq!(keys.len(), 4);
        assert_eq!(keys[0], ShardKey { year: 2019, first_half: true });
        assert_eq!(keys[3], ShardKey { year: 2020, first_half: false });
    }
}
