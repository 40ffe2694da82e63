//! Data model shared across the ingestion pipeline: the parser's raw commit
//! shape, the enricher's output event shape, and the types persisted to the
//! cache and last-sync state.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::external::LanguageSummary;

/// A single `path, action` file change as the parser sees it, before rollup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDelta {
    pub path: String,
    pub action: FileAction,
    pub added: Option<u64>,
    pub removed: Option<u64>,
    pub old_modes: Option<String>,
    pub new_modes: Option<String>,
    pub old_index: Option<String>,
    pub new_index: Option<String>,
    pub new_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
    Unmerged,
    Unknown,
}

impl FileAction {
    pub fn from_code(code: &str) -> Self {
        match code.chars().next() {
            Some('A') => FileAction::Added,
            Some('M') => FileAction::Modified,
            Some('D') => FileAction::Deleted,
            Some('R') => FileAction::Renamed,
            Some('C') => FileAction::Copied,
            Some('T') => FileAction::TypeChanged,
            Some('U') => FileAction::Unmerged,
            _ => FileAction::Unknown,
        }
    }
}

/// Either one trailer value or several; git commit messages sometimes repeat a
/// trailer key (e.g. more than one `Signed-off-by:` line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrailerValue {
    Single(String),
    Many(Vec<String>),
}

impl TrailerValue {
    pub fn push(&mut self, value: String) {
        match self {
            TrailerValue::Single(existing) => {
                if *existing != value {
                    *self = TrailerValue::Many(vec![existing.clone(), value]);
                }
            }
            TrailerValue::Many(values) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
    }

    pub fn as_slice(&self) -> Vec<&str> {
        match self {
            TrailerValue::Single(v) => vec![v.as_str()],
            TrailerValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// Canonical trailer names the dictionary in [`crate::trailers`] maps aliases to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalTrailer {
    SignedOffBy,
    CoAuthoredBy,
    ReviewedBy,
    TestedBy,
    ApprovedBy,
    ReportedBy,
    InformedBy,
    ResolvedBy,
    InfluencedBy,
    CommittedBy,
}

impl CanonicalTrailer {
    pub fn header_name(self) -> &'static str {
        match self {
            CanonicalTrailer::SignedOffBy => "Signed-off-by",
            CanonicalTrailer::CoAuthoredBy => "Co-authored-by",
            CanonicalTrailer::ReviewedBy => "Reviewed-by",
            CanonicalTrailer::TestedBy => "Tested-by",
            CanonicalTrailer::ApprovedBy => "Approved-by",
            CanonicalTrailer::ReportedBy => "Reported-by",
            CanonicalTrailer::InformedBy => "Informed-by",
            CanonicalTrailer::ResolvedBy => "Resolved-by",
            CanonicalTrailer::InfluencedBy => "Influenced-by",
            CanonicalTrailer::CommittedBy => "Committed-by",
        }
    }

    /// The role this trailer contributes, and whether that role may coincide
    /// with the commit's author identity.
    pub fn role(self) -> Role {
        match self {
            CanonicalTrailer::SignedOffBy => Role::Signer,
            CanonicalTrailer::CoAuthoredBy => Role::CoAuthor,
            CanonicalTrailer::ReviewedBy => Role::Reviewer,
            CanonicalTrailer::TestedBy => Role::Tester,
            CanonicalTrailer::ApprovedBy => Role::Approver,
            CanonicalTrailer::ReportedBy => Role::Reporter,
            CanonicalTrailer::InformedBy => Role::Informer,
            CanonicalTrailer::ResolvedBy => Role::Resolver,
            CanonicalTrailer::InfluencedBy => Role::Influencer,
            CanonicalTrailer::CommittedBy => Role::Committer,
        }
    }

    pub fn allows_same_as_author(self) -> bool {
        !matches!(
            self,
            CanonicalTrailer::CoAuthoredBy
                | CanonicalTrailer::ApprovedBy
                | CanonicalTrailer::ReviewedBy
        )
    }
}

/// Raw commit as produced by the state-machine parser (C2), before enrichment.
#[derive(Debug, Clone)]
pub struct RawCommit {
    pub sha: String,
    pub parent_shas: Vec<String>,
    pub refs: Vec<String>,
    pub author_raw: String,
    pub committer_raw: String,
    pub author_date: Option<DateTime<FixedOffset>>,
    pub commit_date: Option<DateTime<FixedOffset>>,
    pub message: String,
    pub files: Vec<FileDelta>,
    pub trailers: HashMap<CanonicalTrailer, TrailerValue>,
    /// Trailers whose canonical name collided with an already-present header
    /// of the same name; stored under `<Name>-Trailer` per the parser's
    /// tie-break policy (SPEC_FULL.md §4.1).
    pub renamed_trailers: HashMap<String, TrailerValue>,
    pub headers: HashMap<String, String>,
    pub empty_commit: bool,
}

/// Closed set of roles a contributor can hold on a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Author,
    Committer,
    CoAuthor,
    Signer,
    Tester,
    Approver,
    Reviewer,
    Reporter,
    Informer,
    Resolver,
    Influencer,
}

/// A normalized person identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub source: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub is_verified: bool,
}

/// One contributor entry on an enriched commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub identity: Identity,
    pub role: Role,
    pub weight: f64,
}

/// Per-extension rollup of file changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStat {
    #[serde(rename = "type")]
    pub extension: String,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub files_created: u64,
    pub files_modified: u64,
    pub files_deleted: u64,
    pub actual_lines_of_code: Option<u64>,
    /// `cloc commit <sha> --json`'s `SUM.code`, stamped only on HEAD's final
    /// extension bucket (§4.4) — distinct from `actual_lines_of_code`, which
    /// carries the `gitops` whole-repository LOC figure instead.
    pub cloc_count: Option<u64>,
}

/// Enriched commit: the shape emitted downstream (C4's output, C10's payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedCommit {
    pub id: String,
    pub repository_id: String,
    pub url: String,
    pub sha: String,
    pub short_hash: String,
    pub branch: String,
    pub default_branch: bool,
    pub message: String,
    pub full_message: String,
    pub parent_shas: Vec<String>,
    pub authored_timestamp: DateTime<Utc>,
    pub committed_timestamp: DateTime<Utc>,
    pub authored_timestamp_local: DateTime<FixedOffset>,
    pub committed_timestamp_local: DateTime<FixedOffset>,
    pub doc_commit: bool,
    pub merge_commit: bool,
    pub orphaned: bool,
    pub contributors: Vec<Contributor>,
    pub files: Vec<FileStat>,
    /// Programming-language summary from the LOC collector (C5), HEAD-at-sync
    /// and attached to every commit emitted this run, not just HEAD's (§4.4).
    pub languages: Vec<LanguageSummary>,
    pub sync_timestamp: DateTime<Utc>,
}

pub const MESSAGE_MAX_LEN: usize = 16_384;

/// Event action accompanying a published [`EnrichedCommit`] payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    #[serde(rename = "commit.created")]
    Created,
    #[serde(rename = "commit.updated")]
    Updated,
}

/// The envelope every emitted event carries (§6 Event envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub action: EventAction,
    pub connector: String,
    pub connector_version: String,
    pub source: String,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payload: EnrichedCommit,
}

/// Persisted cache row (C7), one per content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub entity_id: String,
    pub source_entity_id: String,
    pub file_location: String,
    pub hash: String,
    pub orphaned: bool,
    pub from_dl: bool,
    pub content: String,
    pub commit_date: DateTime<Utc>,
}

/// Resume state persisted across runs (C9 step 1/10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastSync {
    pub last_sync: DateTime<Utc>,
    pub head: String,
    pub target: u64,
    pub total: u64,
    pub first_commit_at: Option<DateTime<Utc>>,
}
