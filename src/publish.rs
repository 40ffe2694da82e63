//! Publisher adapter (C10, SPEC_FULL.md §4.9) and cross-cutting progress
//! reporting (§4.10).
//!
//! The actual transport is the `ObjectStorePublisher` trait in
//! [`crate::external`]; this module owns the parts of the contract that
//! don't belong to a specific transport: building the event envelope (§6),
//! splitting enriched commits into fixed-size packs, and the default
//! connector identity stamped on every event. Grounded on
//! `src/sync/dispatcher.rs`'s batch-flush-then-ack shape
//! (`import_epoch_emails_to_database_and_cache`'s chunking loop),
//! generalized from a database chunk size to the spec's fixed `PackSize`.

use chrono::Utc;

use crate::models::{EnrichedCommit, Event, EventAction};

/// Unit of downstream publication (Glossary: "Pack").
pub const PACK_SIZE: usize = 1000;

pub const CONNECTOR_NAME: &str = env!("CARGO_PKG_NAME");
pub const CONNECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wrap one enriched commit in the event envelope every emitted event
/// carries (§6 Event envelope).
pub fn envelope(action: EventAction, source: &str, payload: EnrichedCommit) -> Event {
    let now = Utc::now();
    Event {
        action,
        connector: CONNECTOR_NAME.to_string(),
        connector_version: CONNECTOR_VERSION.to_string(),
        source: source.to_string(),
        created_by: CONNECTOR_NAME.to_string(),
        updated_by: CONNECTOR_NAME.to_string(),
        created_at: now,
        updated_at: now,
        payload,
    }
}

/// Split a run's accumulated events into fixed-size packs (Glossary:
/// "Pack"), preserving enqueue order within each pack (§5 ordering
/// guarantees: "within a single pack, publish preserves the controller's
/// enqueue order").
pub fn into_packs(events: Vec<Event>) -> Vec<Vec<Event>> {
    events.chunks(PACK_SIZE).map(<[Event]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileStat;
    use chrono::{FixedOffset, TimeZone};

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
    fn envelope_stamps_connector_identity_from_cargo_metadata() {
        let event = envelope(EventAction::Created, "github", sample_commit("init"));
        assert_eq!(event.connector, CONNECTOR_NAME);
        assert_eq!(event.connector_version, CONNECTOR_VERSION);
        assert_eq!(event.source, "github");
    }

    #[test]
    fn into_packs_splits_at_pack_size_boundary() {
        let events: Vec<Event> = (0..(PACK_SIZE + 10))
            .map(|i| envelope(EventAction::Created, "github", sample_commit(&format!("commit {i}"))))
            .collect();
        let packs = into_packs(events);
        assert_eq!(packs.len(), 2);
        assert_eq!(packs[0].len(), PACK_SIZE);
        assert_eq!(packs[1].len(), 10);
    }

    #[test]
    fn into_packs_preserves_order_within_a_pack() {
        let events: Vec<Event> = (0..5)
            .map(|i| envelope(EventAction::Created, "github", sample_commit(&format!("commit {i}"))))
            .collect();
        let packs = into_packs(events);
        for (i, event) in packs[0].iter().enumerate() {
            assert_eq!(event.payload.message, format!("commit {i}"));
        }
    }
}
