//! The decision-observer seam: anything that wants to react to a completed
//! pipeline result (logging, metrics, future dashboards) implements this.

use radius_core::{CanonicalEvent, PipelineResult};

pub trait DecisionObserver: Send + Sync {
    fn on_decision(&self, event: &CanonicalEvent, result: &PipelineResult);
}
