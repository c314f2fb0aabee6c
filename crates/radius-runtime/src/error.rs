//! Runtime-construction and per-request errors (spec §7): everything here
//! aborts startup, never a single `handle` call — a bad event still
//! degrades to a `Deny` response rather than propagating an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] radius_core::CoreError),
    #[error(transparent)]
    Store(#[from] radius_state::StateError),
    #[error("missing approval connector config: {0}")]
    MissingConnectorConfig(String),
    #[error("no connector for challenge channel: {0}")]
    UnsupportedChannel(String),
}
