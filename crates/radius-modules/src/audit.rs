//! 4.2.15 audit — always-allow module that forwards every event to the
//! configured audit sink. The decision chain and full pipeline result are
//! recorded separately by the runtime once the pipeline terminates; this
//! module only records the event reaching this phase.

use async_trait::async_trait;
use radius_core::{AuditSink, CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Phase};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::common::parse_mode;

pub struct Audit {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    sink: Arc<dyn AuditSink>,
}

impl Audit {
    pub fn new(cfg: &Value, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            mode: parse_mode(cfg),
            phases: Phase::ALL.into_iter().collect(),
            sink,
        }
    }
}

#[async_trait]
impl Module for Audit {
    fn name(&self) -> &str {
        "audit"
    }

    fn phases(&self) -> &HashSet<Phase> {
        &self.phases
    }

    fn mode(&self) -> ModuleMode {
        self.mode
    }

    async fn evaluate(&self, event: &CanonicalEvent) -> Result<Decision, ModuleError> {
        self.sink.record_event(event);
        Ok(Decision::allow(self.name(), "recorded"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::{Framework, PipelineResult};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSink {
        events: Mutex<u32>,
    }

    impl AuditSink for CountingSink {
        fn record_event(&self, _event: &CanonicalEvent) {
            *self.events.lock().unwrap() += 1;
        }

        fn record_result(&self, _event: &CanonicalEvent, _result: &PipelineResult) {}
    }

    #[tokio::test]
    async fn records_every_event_and_always_allows() {
        let sink = Arc::new(CountingSink::default());
        let module = Audit::new(&serde_json::json!({}), sink.clone());
        let e = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        let decision = module.evaluate(&e).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Allow);
        assert_eq!(*sink.events.lock().unwrap(), 1);
    }
}
