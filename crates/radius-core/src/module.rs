//! The `Module` trait (spec §3): every policy module is a named, phase- and
//! mode-tagged predicate producing exactly one decision per event.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;

use crate::decision::Decision;
use crate::event::{CanonicalEvent, Phase};

/// Whether a module's non-allow decisions are actually enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleMode {
    /// Deny/challenge/modify decisions are applied to the pipeline result.
    Enforce,
    /// Decisions are recorded and surfaced as alerts, never enforced.
    Observe,
}

/// Error raised from inside `Module::evaluate`. The pipeline (radius-pipeline)
/// turns this into a fail-closed deny (enforce mode) or an alert (observe
/// mode) per spec §4.1 step 3 — it never propagates past the pipeline.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ModuleError(pub String);

impl ModuleError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A self-contained policy predicate.
#[async_trait]
pub trait Module: Send + Sync {
    /// Stable, unique name used in decision chains, config, and metrics.
    fn name(&self) -> &str;

    /// Phases this module participates in.
    fn phases(&self) -> &HashSet<Phase>;

    /// Whether this module's decisions are enforced or merely observed.
    fn mode(&self) -> ModuleMode;

    /// Evaluate one event, producing exactly one decision.
    async fn evaluate(&self, event: &CanonicalEvent) -> Result<Decision, ModuleError>;
}

/// Construction-time configuration payload every module factory consumes.
pub type ModuleConfig = Value;
