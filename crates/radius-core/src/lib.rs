//! Canonical event, decision, and module types shared across the workspace.
//!
//! No model is on the decision path here: this crate only carries data
//! shapes and the pure `Module` contract (§3 of the governing design).

pub mod audit_sink;
pub mod clock;
pub mod decision;
pub mod error;
pub mod event;
pub mod ids;
pub mod lease;
pub mod merge;
pub mod module;

pub use audit_sink::AuditSink;
pub use decision::{Action, Channel, ChallengeSpec, Decision, Patch, PipelineResult, Severity, Transforms};
pub use error::CoreError;
pub use event::{Artifact, ArtifactKind, CanonicalEvent, Framework, Phase, ToolCall, ToolResult};
pub use lease::ApprovalLease;
pub use module::{Module, ModuleConfig, ModuleError, ModuleMode};
