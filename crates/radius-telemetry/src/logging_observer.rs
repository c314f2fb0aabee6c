//! Logs one structured line per completed pipeline result.

use radius_core::{Action, CanonicalEvent, PipelineResult};

use crate::observer::DecisionObserver;

/// Emits a `tracing` event per pipeline result, at a level matching severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl DecisionObserver for LoggingObserver {
    fn on_decision(&self, event: &CanonicalEvent, result: &PipelineResult) {
        let phase = format!("{:?}", event.phase);
        let action = format!("{:?}", result.final_action);
        match result.final_action {
            Action::Deny | Action::Challenge => tracing::warn!(
                phase,
                framework = ?event.framework,
                session = event.session,
                action,
                reason = result.final_reason,
                "pipeline decision"
            ),
            _ => tracing::info!(
                phase,
                framework = ?event.framework,
                session = event.session,
                action,
                reason = result.final_reason,
                "pipeline decision"
            ),
        }
        for alert in &result.alerts {
            tracing::warn!(phase, session = event.session, alert, "pipeline alert");
        }
    }
}
