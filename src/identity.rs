//! Identity constructor (C11): normalizes `(source, email, name, username)`
//! into a stable identity id.
//!
//! Grounded on `src/sync/dispatcher.rs`'s `prepare_thread_batch_data`, which
//! computes a SHA-256 membership hash over sorted fields to get a stable,
//! order-independent fingerprint; the same technique produces a deterministic
//! identity id here instead of a thread membership id.

use sha2::{Digest, Sha256};

use crate::models::Identity;

/// Build a stable identity id from the lowercased, trimmed tuple fields.
/// Two identities with the same normalized tuple always get the same id,
/// independent of process or memory layout.
pub fn identity_id(source: &str, email: Option<&str>, name: Option<&str>, username: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    for field in [Some(source), email, name, username] {
        let normalized = field.unwrap_or("").trim().to_lowercase();
        hasher.update(normalized.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}

/// Construct a full [`Identity`] for a `(name, email)` pair observed from a
/// given source. `username` and verification are not available without the
/// identity/auth token service (out of scope, SPEC_FULL.md §1); `is_verified`
/// is always `false` here.
pub fn build_identity(source: &str, name: Option<&str>, email: Option<&str>) -> Identity {
    let id = identity_id(source, email, name, None);
    Identity {
        id,
        source: source.to_string(),
        name: name.map(str::to_string),
        email: email.map(str::to_string),
        username: None,
        is_verified: false,
    }
}

/// Derive a repository id from `(source_id, url, source_type)` — the same
/// deterministic-hash technique as [`identity_id`], applied to the tuple
/// that identifies a repository instead of a person (Data Model §3:
/// "`repository_id` (derived from `(source_id, url, source_type)`)").
pub fn derive_repository_id(source_id: Option<&str>, url: &str, source_type: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [source_id, Some(url), Some(source_type)] {
        hasher.update(field.unwrap_or("").trim().to_lowercase().as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}
