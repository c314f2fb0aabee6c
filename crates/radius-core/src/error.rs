//! Error taxonomy shared at the core (spec §7): configuration, and the
//! connector/state-store kinds other crates specialize further.

use thiserror::Error;

/// Errors surfaced during configuration resolution, aborting initialization.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("undefined template variable: {0}")]
    UndefinedTemplateVar(String),
    #[error("unknown module: {0}")]
    UnknownModule(String),
    #[error("unknown framework: {0}")]
    UnknownFramework(String),
    #[error("unknown profile: {0}")]
    UnknownProfile(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
