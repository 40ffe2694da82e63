//! Enricher (C4, SPEC_FULL.md §4.3): turns a [`RawCommit`] into the emitted
//! [`EnrichedCommit`] event payload — timezone handling, title/message
//! truncation, branch derivation, commit-URL derivation, file rollup by
//! extension, and contributor assembly.
//!
//! Grounded on `src/sync/dispatcher.rs`'s `prepare_thread_batch_data` for the
//! general shape of "take a raw parsed record, assemble a typed payload,
//! compute a content fingerprint" and on
//! `src/threading/algorithm/jwz_threading.rs`'s `email_references: HashMap<i32,
//! Vec<String>>` ("in order"), which pairs a `HashMap` with an explicit `Vec`
//! to preserve insertion order where it matters downstream — the same
//! side-car-order-vec technique `rollup_files` below uses to keep the
//! extension rollup in first-seen order despite being keyed by a `HashMap`.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::author::{author_weight, parse_authors, split_name_email};
use crate::external::LanguageSummary;
use crate::identity::build_identity;
use crate::models::{Contributor, EnrichedCommit, FileAction, FileStat, Identity, RawCommit, Role, MESSAGE_MAX_LEN};

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("commit {sha} is missing AuthorDate")]
    MissingAuthorDate { sha: String },
    #[error("commit {sha} is missing CommitDate")]
    MissingCommitDate { sha: String },
}

static DOC_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(md|rst|doc|docx|txt|pdf|jpg|jpeg|png|svg|img)$").unwrap()
});
static DOC_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(docs/|documentation/|readme)").unwrap());

fn is_doc_path(path: &str) -> bool {
    DOC_SUFFIX_RE.is_match(path) || DOC_PREFIX_RE.is_match(path)
}

/// Context shared across every commit enriched within one sync run: the
/// repository identity, its default branch, the orphan set from C6, the
/// language summary from C5 (attached to every commit — §4.4), and the
/// HEAD LOC/cloc figures (only present when enriching the most recent
/// commit of the run — §4.4).
pub struct EnrichContext<'a> {
    pub repository_id: String,
    pub url: String,
    pub default_branch: String,
    pub orphan_shas: &'a HashSet<String>,
    pub head_loc: Option<u64>,
    pub head_cloc: Option<u64>,
    pub languages: Vec<LanguageSummary>,
}

pub fn derive_commit_id(repository_id: &str, sha: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repository_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(sha.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `GetCommitBranch` policy (Glossary): strip `origin/` and `refs/heads/`
/// prefixes; the last non-default branch ref wins; else the last tag; else
/// the default branch.
pub fn derive_branch(refs: &[String], default_branch: &str) -> String {
    let mut last_branch: Option<String> = None;
    let mut last_tag: Option<String> = None;

    for raw_ref in refs {
        let mut r = raw_ref.trim();
        if let Some(tag) = r.strip_prefix("tag:") {
            last_tag = Some(tag.trim().to_string());
            continue;
        }
        r = r.strip_prefix("HEAD ->").map(str::trim).unwrap_or(r);
        r = r.strip_prefix("refs/remotes/origin/").unwrap_or(r);
        r = r.strip_prefix("origin/").unwrap_or(r);
        r = r.strip_prefix("refs/heads/").unwrap_or(r);
        let r = r.trim();
        if r.is_empty() {
            continue;
        }
        if r != default_branch {
            last_branch = Some(r.to_string());
        }
    }

    last_branch.or(last_tag).unwrap_or_else(|| default_branch.to_string())
}

fn trim_trailing_slash(s: &str) -> &str {
    s.trim_end_matches('/')
}

/// Commit-URL derivation by host pattern (SPEC_FULL.md §6, bit-exact table).
pub fn derive_commit_url(origin: &str, sha: &str) -> String {
    if let Some(rest) = origin.strip_prefix("git://") {
        return format!("http://{}/commit/?id={sha}", trim_trailing_slash(rest));
    }
    if origin.starts_with("https://git.") || origin.starts_with("http://git.") {
        return format!("{}/commit/?id={sha}", trim_trailing_slash(origin));
    }
    if origin.contains("github.com") {
        return format!("{}/commit/{sha}", trim_trailing_slash(origin));
    }
    if origin.contains("gitlab.com") {
        return format!("{}/-/commit/{sha}", trim_trailing_slash(origin));
    }
    if origin.contains("bitbucket.org") {
        return format!("{}/commits/{sha}", trim_trailing_slash(origin));
    }
    if origin.contains("gerrit") || origin.contains("review") {
        if let Some((scheme, rest)) = origin.split_once("://") {
            let rest = trim_trailing_slash(rest);
            let mut parts = rest.splitn(2, '/');
            let host = parts.next().unwrap_or("");
            let project = parts.next().unwrap_or("").trim_end_matches(".git");
            let gitweb_segment = if host.contains("review") { "r/gitweb" } else { "gerrit/gitweb" };
            return format!("{scheme}://{host}/{gitweb_segment}?p={project}.git;a=commit;h={sha}");
        }
    }
    format!("{}/{sha}", trim_trailing_slash(origin))
}

/// Repository-source type classification, by the same host-pattern table
/// `derive_commit_url` branches on (SPEC_FULL.md §6). Kept as a sibling
/// function rather than folded into `derive_commit_url`'s return value so
/// callers that only need the type (e.g. the repository-id derivation in
/// `crate::sync::controller`) don't pay for URL string formatting.
pub fn source_type_for_origin(origin: &str) -> &'static str {
    if origin.starts_with("git://") || origin.starts_with("https://git.") || origin.starts_with("http://git.") {
        return "git";
    }
    if origin.contains("github.com") {
        return "github";
    }
    if origin.contains("gitlab.com") {
        return "gitlab";
    }
    if origin.contains("bitbucket.org") {
        return "bitbucket";
    }
    if origin.contains("gerrit") || origin.contains("review") {
        return "gerrit";
    }
    "unknown"
}

fn extension_of(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rfind('.') {
        Some(idx) if idx + 1 < file_name.len() => file_name[idx + 1..].to_lowercase(),
        _ => "UNKNOWN".to_string(),
    }
}

/// Rollup bucket a file action contributes to. Renames and copies behave as
/// modifications of the (canonicalized) old path for counting purposes —
/// resolves the scenario in SPEC_FULL.md §8.4, where a rename is expected to
/// land in `files_modified` rather than `files_created`.
fn bucket_for(action: FileAction) -> RollupBucket {
    match action {
        FileAction::Deleted => RollupBucket::Deleted,
        FileAction::Modified | FileAction::Renamed | FileAction::Copied | FileAction::TypeChanged | FileAction::Unmerged => {
            RollupBucket::Modified
        }
        FileAction::Added | FileAction::Unknown => RollupBucket::Created,
    }
}

enum RollupBucket {
    Created,
    Modified,
    Deleted,
}

fn rollup_files(raw: &RawCommit, head_loc: Option<u64>, head_cloc: Option<u64>) -> Vec<FileStat> {
    let mut order: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut stats: Vec<FileStat> = Vec::new();

    for file in &raw.files {
        let ext = extension_of(&file.path);
        let idx = if let Some(&i) = index.get(&ext) {
            i
        } else {
            let i = stats.len();
            index.insert(ext.clone(), i);
            order.push(ext.clone());
            stats.push(FileStat {
                extension: ext,
                lines_added: 0,
                lines_removed: 0,
                files_created: 0,
                files_modified: 0,
                files_deleted: 0,
                actual_lines_of_code: None,
                cloc_count: None,
            });
            i
        };

        let entry = &mut stats[idx];
        entry.lines_added += file.added.unwrap_or(0);
        entry.lines_removed += file.removed.unwrap_or(0);
        match bucket_for(file.action) {
            RollupBucket::Created => entry.files_created += 1,
            RollupBucket::Modified => entry.files_modified += 1,
            RollupBucket::Deleted => entry.files_deleted += 1,
        }
    }

    if let Some(last_ext) = order.last() {
        if let Some(&idx) = index.get(last_ext) {
            if let Some(loc) = head_loc {
                stats[idx].actual_lines_of_code = Some(loc);
            }
            if let Some(cloc) = head_cloc {
                stats[idx].cloc_count = Some(cloc);
            }
        }
    }

    stats
}

fn contributor_identity(source: &str, raw: &str) -> Identity {
    let parsed = split_name_email(raw);
    build_identity(source, Some(&parsed.name), parsed.email.as_deref())
}

fn build_contributors(raw: &RawCommit) -> Vec<Contributor> {
    let mut contributors = Vec::new();
    let mut author_ids = HashSet::new();

    let authors = parse_authors(&raw.author_raw);
    let weight = author_weight(authors.len());
    for author in &authors {
        let identity = build_identity("git", Some(&author.name), author.email.as_deref());
        author_ids.insert(identity.id.clone());
        contributors.push(Contributor { identity, role: Role::Author, weight });
    }

    let committer = contributor_identity("git", &raw.committer_raw);
    contributors.push(Contributor { identity: committer, role: Role::Committer, weight: 1.0 });

    for (canon, value) in &raw.trailers {
        let role = canon.role();
        for raw_value in value.as_slice() {
            let identity = contributor_identity("git", raw_value);
            if !canon.allows_same_as_author() && author_ids.contains(&identity.id) {
                continue;
            }
            contributors.push(Contributor { identity, role, weight: 1.0 });
        }
    }

    // Authors supersede co-authors even when the trailer's own
    // allows_same_as_author check didn't already exclude them.
    contributors.retain(|c| !(c.role == Role::CoAuthor && author_ids.contains(&c.identity.id)));

    let mut seen: HashSet<(Role, String)> = HashSet::new();
    contributors.retain(|c| seen.insert((c.role, c.identity.id.clone())));

    contributors
}

pub fn enrich(raw: &RawCommit, ctx: &EnrichContext) -> Result<EnrichedCommit, EnrichError> {
    let author_date = raw.author_date.ok_or_else(|| EnrichError::MissingAuthorDate { sha: raw.sha.clone() })?;
    let commit_date = raw.commit_date.ok_or_else(|| EnrichError::MissingCommitDate { sha: raw.sha.clone() })?;

    let id = derive_commit_id(&ctx.repository_id, &raw.sha);
    let branch = derive_branch(&raw.refs, &ctx.default_branch);
    let url = derive_commit_url(&ctx.url, &raw.sha);
    let short_hash = raw.sha.chars().take(7).collect::<String>();

    let doc_commit = raw.files.iter().any(|f| {
        is_doc_path(&f.path) || f.new_path.as_deref().map(is_doc_path).unwrap_or(false)
    });
    let merge_commit = raw.files.is_empty();

    let message: String = raw.message.chars().take(MESSAGE_MAX_LEN).collect();

    Ok(EnrichedCommit {
        id,
        repository_id: ctx.repository_id.clone(),
        url,
        sha: raw.sha.clone(),
        short_hash,
        branch: branch.clone(),
        default_branch: branch == ctx.default_branch,
        message,
        full_message: raw.message.clone(),
        parent_shas: raw.parent_shas.clone(),
        authored_timestamp: author_date.with_timezone(&Utc),
        committed_timestamp: commit_date.with_timezone(&Utc),
        authored_timestamp_local: author_date,
        committed_timestamp_local: commit_date,
        doc_commit,
        merge_commit,
        orphaned: ctx.orphan_shas.contains(&raw.sha),
        contributors: build_contributors(raw),
        files: rollup_files(raw, ctx.head_loc, ctx.head_cloc),
        languages: ctx.languages.clone(),
        sync_timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalTrailer, FileDelta, TrailerValue};
    use chrono::{FixedOffset, TimeZone};

    fn offset(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).unwrap()
    }

    fn base_commit() -> RawCommit {
        RawCommit {
            sha: "abc1234def5678900000000000000000000000".to_string(),
            parent_shas: vec![],
            refs: vec![],
            author_raw: "Alice <a@x.com>".to_string(),
            committer_raw: "Alice <a@x.com>".to_string(),
            author_date: Some(offset(0).with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()),
            commit_date: Some(offset(0).with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()),
            message: "init\n\n    Signed-off-by: Alice <a@x.com>".to_string(),
            files: vec![FileDelta {
                path: "README.md".to_string(),
                action: FileAction::Added,
                added: Some(2),
                removed: Some(0),
                old_modes: None,
                new_modes: None,
                old_index: None,
                new_index: None,
                new_path: None,
            }],
            trailers: {
                let mut t = HashMap::new();
                t.insert(CanonicalTrailer::SignedOffBy, TrailerValue::Single("Alice <a@x.com>".to_string()));
                t
            },
            renamed_trailers: HashMap::new(),
            headers: HashMap::new(),
            empty_commit: false,
        }
    }

    #[test]
    fn single_author_doc_commit_scenario() {
        let raw = base_commit();
        let orphans = HashSet::new();
        let ctx = EnrichContext {
            repository_id: "repo-1".to_string(),
            url: "https://github.com/acme/widgets".to_string(),
            default_branch: "main".to_string(),
            orphan_shas: &orphans,
            head_loc: None,
            head_cloc: None,
            languages: Vec::new(),
        };
        let enriched = enrich(&raw, &ctx).unwrap();
        assert!(enriched.doc_commit);
        assert!(!enriched.merge_commit);
        assert_eq!(enriched.files.len(), 1);
        assert_eq!(enriched.files[0].extension, "md");
        assert_eq!(enriched.files[0].files_created, 1);

        let author = enriched.contributors.iter().find(|c| c.role == Role::Author).unwrap();
        assert_eq!(author.weight, 1.0);
        let signer = enriched.contributors.iter().find(|c| c.role == Role::Signer).unwrap();
        assert_eq!(signer.identity.email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn pair_programming_splits_weight_evenly() {
        let mut raw = base_commit();
        raw.author_raw = "A and B <b@x.com>".to_string();
        raw.trailers.clear();
        let orphans = HashSet::new();
        let ctx = EnrichContext {
            repository_id: "repo-1".to_string(),
            url: "https://git.example.com/acme/widgets".to_string(),
            default_branch: "main".to_string(),
            orphan_shas: &orphans,
            head_loc: None,
            head_cloc: None,
            languages: Vec::new(),
        };
        let enriched = enrich(&raw, &ctx).unwrap();
        let authors: Vec<_> = enriched.contributors.iter().filter(|c| c.role == Role::Author).collect();
        assert_eq!(authors.len(), 2);
        assert!(authors.iter().all(|c| c.weight == 0.5));
        assert!(authors.iter().all(|c| c.identity.email.as_deref() == Some("b@x.com")));
    }

    #[test]
    fn co_author_matching_author_identity_is_dropped() {
        let mut raw = base_commit();
        raw.trailers.clear();
        raw.trailers.insert(CanonicalTrailer::CoAuthoredBy, TrailerValue::Single("Alice <a@x.com>".to_string()));
        let orphans = HashSet::new();
        let ctx = EnrichContext {
            repository_id: "repo-1".to_string(),
            url: "https://github.com/acme/widgets".to_string(),
            default_branch: "main".to_string(),
            orphan_shas: &orphans,
            head_loc: None,
            head_cloc: None,
            languages: Vec::new(),
        };
        let enriched = enrich(&raw, &ctx).unwrap();
        assert!(enriched.contributors.iter().all(|c| c.role != Role::CoAuthor));
        assert_eq!(enriched.contributors.iter().filter(|c| c.role == Role::Author).count(), 1);
    }

    #[test]
    fn empty_commit_is_merge_commit_with_no_doc_flag() {
        let mut raw = base_commit();
        raw.files.clear();
        let orphans = HashSet::new();
        let ctx = EnrichContext {
            repository_id: "repo-1".to_string(),
            url: "https://github.com/acme/widgets".to_string(),
            default_branch: "main".to_string(),
            orphan_shas: &orphans,
            head_loc: None,
            head_cloc: None,
            languages: Vec::new(),
        };
        let enriched = enrich(&raw, &ctx).unwrap();
        assert!(enriched.merge_commit);
        assert!(!enriched.doc_commit);
        assert!(enriched.files.is_empty());
    }

    #[test]
    fn missing_author_date_is_an_error() {
        let mut raw = base_commit();
        raw.author_date = None;
        let orphans = HashSet::new();
        let ctx = EnrichContext {
            repository_id: "repo-1".to_string(),
            url: "https://github.com/acme/widgets".to_string(),
            default_branch: "main".to_string(),
            orphan_shas: &orphans,
            head_loc: None,
            head_cloc: None,
            languages: Vec::new(),
        };
        assert!(matches!(enrich(&raw, &ctx), Err(EnrichError::MissingAuthorDate { .. })));
    }

    #[test]
    fn branch_prefers_non_default_over_default() {
        let refs = vec!["origin/main".to_string(), "origin/feature-x".to_string()];
        assert_eq!(derive_branch(&refs, "main"), "feature-x");
    }

    #[test]
    fn branch_falls_back_to_tag_then_default() {
        assert_eq!(derive_branch(&["tag: v1.0".to_string()], "main"), "v1.0");
        assert_eq!(derive_branch(&[], "main"), "main");
    }

    #[test]
    fn commit_url_derivation_table() {
        let sha = "deadbeef";
        assert_eq!(derive_commit_url("git://example.com/repo", sha), "http://example.com/repo/commit/?id=deadbeef");
        assert_eq!(derive_commit_url("https://git.example.com/repo", sha), "https://git.example.com/repo/commit/?id=deadbeef");
        assert_eq!(derive_commit_url("https://github.com/acme/widgets", sha), "https://github.com/acme/widgets/commit/deadbeef");
        assert_eq!(derive_commit_url("https://gitlab.com/acme/widgets", sha), "https://gitlab.com/acme/widgets/-/commit/deadbeef");
        assert_eq!(derive_commit_url("https://bitbucket.org/acme/widgets", sha), "https://bitbucket.org/acme/widgets/commits/deadbeef");
        assert_eq!(derive_commit_url("https://other.example.com/acme", sha), "https://other.example.com/acme/deadbeef");
    }

    #[test]
    fn source_type_classification_matches_url_derivation_table() {
        assert_eq!(source_type_for_origin("git://example.com/repo"), "git");
        assert_eq!(source_type_for_origin("https://git.example.com/repo"), "git");
        assert_eq!(source_type_for_origin("https://github.com/acme/widgets"), "github");
        assert_eq!(source_type_for_origin("https://gitlab.com/acme/widgets"), "gitlab");
        assert_eq!(source_type_for_origin("https://bitbucket.org/acme/widgets"), "bitbucket");
        assert_eq!(source_type_for_origin("https://review.example.com/acme"), "gerrit");
        assert_eq!(source_type_for_origin("https://other.example.com/acme"), "unknown");
    }

    #[test]
    fn gerrit_url_uses_gitweb_form() {
        let url = derive_commit_url("https://review.example.com/acme/widgets", "deadbeef");
        assert_eq!(url, "https://review.example.com/r/gitweb?p=acme/widgets.git;a=commit;h=deadbeef");
    }

    #[test]
    fn extension_of_handles_unknown_cases() {
        assert_eq!(extension_of("Makefile"), "UNKNOWN");
        assert_eq!(extension_of("trailing."), "UNKNOWN");
        assert_eq!(extension_of("src/main.rs"), "rs");
    }

    #[test]
    fn message_is_truncated_to_max_len_but_full_message_is_not() {
        let mut raw = base_commit();
        raw.message = "x".repeat(MESSAGE_MAX_LEN + 500);
        let orphans = HashSet::new();
        let ctx = EnrichContext {
            repository_id: "repo-1".to_string(),
            url: "https://github.com/acme/widgets".to_string(),
            default_branch: "main".to_string(),
            orphan_shas: &orphans,
            head_loc: None,
            head_cloc: None,
            languages: Vec::new(),
        };
        let enriched = enrich(&raw, &ctx).unwrap();
        assert_eq!(enriched.message.len(), MESSAGE_MAX_LEN);
        assert_eq!(enriched.full_message.len(), MESSAGE_MAX_LEN + 500);
    }
}
