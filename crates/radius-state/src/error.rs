//! State-store errors (spec §7): a required SQLite store unavailable at a
//! required-mode call site is an initialization error; elsewhere, a caller
//! should degrade to the in-memory store with identical semantics.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("sqlite store required but unavailable: {0}")]
    RequiredStoreUnavailable(String),
    #[error("lock poisoned for key {0}")]
    LockPoisoned(String),
}
