//! Top-level error type composing every component's error kind (§7 of the
//! specification). Each component defines its own `thiserror`-derived enum
//! (the `search/error.rs` pattern); this module glues them together so
//! `main()` has one `Result` to match on.

use thiserror::Error;

use crate::cache::CacheError;
use crate::config::ValidationError;
use crate::external::{GitBinaryError, ObjectStoreError, PublishError};
use crate::loc::LocError;
use crate::orphan::OrphanError;
use crate::sync::parser::ParseError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("configuration invalid: {0}")]
    Validation(#[from] ValidationError),

    #[error("git subprocess failed: {0}")]
    Git(#[from] GitBinaryError),

    #[error("commit parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("loc collector failed: {0}")]
    Loc(#[from] LocError),

    #[error("orphan detector failed: {0}")]
    Orphan(#[from] OrphanError),

    #[error("cache I/O failed: {0}")]
    Cache(#[from] CacheError),

    #[error("object store failed: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}
