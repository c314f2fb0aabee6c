//! Generic adapter (spec §4.5, §6): accepts and emits the canonical shapes
//! directly, for callers that already speak the internal model.

use radius_core::{CanonicalEvent, Framework, Phase, PipelineResult};
use serde_json::Value;

use crate::adapter::Adapter;

pub struct GenericAdapter;

impl Adapter for GenericAdapter {
    fn to_event(&self, raw: &Value) -> CanonicalEvent {
        serde_json::from_value(raw.clone())
            .unwrap_or_else(|_| CanonicalEvent::new(Phase::PreRequest, Framework::Generic))
    }

    fn to_response(&self, result: &PipelineResult, _raw: &Value) -> Value {
        serde_json::to_value(result).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::Action;
    use serde_json::json;

    #[test]
    fn round_trips_a_well_formed_canonical_event() {
        let raw = json!({"phase": "pre_tool", "framework": "generic", "session": "s1"});
        let event = GenericAdapter.to_event(&raw);
        assert_eq!(event.phase, Phase::PreTool);
        assert_eq!(event.session, "s1");
    }

    #[test]
    fn malformed_input_falls_back_to_pre_request_unknown_session() {
        let event = GenericAdapter.to_event(&json!("not an event"));
        assert_eq!(event.phase, Phase::PreRequest);
        assert_eq!(event.session, "unknown");
    }

    #[test]
    fn to_response_serializes_the_pipeline_result() {
        let result = PipelineResult::default_action(Action::Allow, "ok");
        let value = GenericAdapter.to_response(&result, &json!({}));
        assert_eq!(value["final_action"], "allow");
    }
}
