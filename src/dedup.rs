//! Deduplicator / updater (C8, SPEC_FULL.md §4.7).
//!
//! Grounded on `src/sync/dispatcher.rs`'s `prepare_thread_batch_data` (SHA-256
//! hash over sorted fields for change detection) and
//! `insert_thread_batch_with_memberships` (hash-comparison skip/update/create
//! decision) — the same two-step "hash, then branch on cache membership"
//! shape, applied to commits instead of thread memberships.

use sha2::{Digest, Sha256};

use crate::models::EnrichedCommit;

/// Narrow, intentionally partial view of a commit hashed for change
/// detection (§4.7): non-semantic re-syncs of the same commit must not
/// re-emit, so fields like `orphaned` or `contributors` are excluded.
pub fn content_hash(repository_url: &str, commit: &EnrichedCommit) -> String {
    let mut hasher = Sha256::new();
    hasher.update(commit.id.as_bytes());
    hasher.update(b"\0");
    hasher.update(commit.sha.as_bytes());
    hasher.update(b"\0");
    hasher.update(repository_url.as_bytes());
    hasher.update(b"\0");
    hasher.update(commit.repository_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(commit.message.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The decision table of §4.7, collapsed into an enum so the controller
/// matches on it rather than re-deriving the four-way branch inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    /// Hash already cached and the entity was previously created: nothing to
    /// emit, only the cache entry's `orphaned` flag is cleared.
    Skip,
    /// Hash not cached and the entity has never been created: emit
    /// `commit.created`.
    Create,
    /// Hash not cached but the entity was already created under a different
    /// hash (its content changed): emit `commit.updated`.
    Update,
}

/// Decide the action for one commit given whether its content hash is
/// already in the cache and whether its `entity_id` has been created before
/// (in this run or a prior one). The `(cached=true, created=false)` case
/// cannot occur given the cache's invariants (§4.6: `entity_id` is uniquely
/// recoverable from `hash`) and is treated as `Skip`, the conservative
/// choice that never double-emits.
pub fn decide(hash_cached: bool, entity_previously_created: bool) -> DedupDecision {
    match (hash_cached, entity_previously_created) {
        (true, true) => DedupDecision::Skip,
        (false, false) => DedupDecision::Create,
        (false, true) => DedupDecision::Update,
        (true, false) => DedupDecision::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnrichedCommit, FileStat};
    use chrono::{FixedOffset, TimeZone, Utc};

    fn sample_commit(message: &str) -> EnrichedCommit {
        let now = Utc::now();
        EnrichedCommit {
            id: "commit-1".to_string(),
            repository_id: "repo-1".to_string(),
            url: "https://github.com/acme/widgets/commit/abc".to_string(),
            sha: "abc1234".to_string(),
            short_hash: "abc1234".to_string(),
            branch: "main".to_string(),
            default_branch: true,
            message: message.to_string(),
            full_message: message.to_string(),
            parent_shas: vec![],
            authored_timestamp: now,
            committed_timestamp: now,
            authored_timestamp_local: FixedOffset::east_opt(0).unwrap().from_utc_datetime(&now.naive_utc()),
            committed_timestamp_local: FixedOffset::east_opt(0).unwrap().from_utc_datetime(&now.naive_utc()),
            doc_commit: false,
            merge_commit: false,
            orphaned: false,
            contributors: vec![],
            files: Vec::<FileStat>::new(),
            languages: Vec::new(),
            sync_timestamp: now,
        }
    }

    #[test]
    fn identical_commits_hash_identically() {
        let a = sample_commit("init");
        let b = sample_commit("init");
        assert_eq!(content_hash("https://github.com/acme/widgets", &a), content_hash("https://github.com/acme/widgets", &b));
    }

    #[test]
    fn different_message_changes_hash() {
        let a = sample_commit("init");
        let b = sample_commit("init v2");
        assert_ne!(content_hash("https://github.com/acme/widgets", &a), content_hash("https://github.com/acme/widgets", &b));
    }

    #[test]
    fn orphaned_flag_does_not_affect_hash() {
        let mut a = sample_commit("init");
        let mut b = sample_commit("init");
        a.orphaned = false;
        b.orphaned = true;
        assert_eq!(content_hash("https://github.com/acme/widgets", &a), content_hash("https://github.com/acme/widgets", &b));
    }

    #[test]
    fn decision_table_matches_spec() {
        assert_eq!(decide(true, true), DedupDecision::Skip);
        assert_eq!(decide(false, false), DedupDecision::Create);
        assert_eq!(decide(false, true), DedupDecision::Update);
        assert_eq!(decide(true, false), DedupDecision::Skip);
    }
}
