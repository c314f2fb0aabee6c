//! The uniform adapter contract (spec §4.5): every orchestrator dialect
//! implements the same `to_event`/`to_response` pair.

use radius_core::{CanonicalEvent, PipelineResult};
use serde_json::Value;

/// Translates between one orchestrator's wire format and the canonical
/// event/result model. Implementations must tolerate malformed `raw` input
/// by falling back to safe defaults rather than panicking.
pub trait Adapter: Send + Sync {
    fn to_event(&self, raw: &Value) -> CanonicalEvent;

    fn to_response(&self, result: &PipelineResult, raw: &Value) -> Value;
}
