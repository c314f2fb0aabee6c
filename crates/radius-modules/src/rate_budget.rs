//! 4.2.8 rate_budget — sliding-window call-rate limiting keyed by session.

use async_trait::async_trait;
use radius_core::clock::Clock;
use radius_core::{CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Phase, Severity};
use radius_state::Store;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::common::parse_mode;

pub struct RateBudget {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    window_ms: u64,
    max_calls: u64,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl RateBudget {
    pub fn new(cfg: &Value, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let window_sec = cfg.get("windowSec").and_then(Value::as_u64).unwrap_or(60);
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreTool, Phase::PreRequest].into_iter().collect(),
            window_ms: window_sec * 1000,
            max_calls: cfg.get("maxCallsPerWindow").and_then(Value::as_u64).unwrap_or(60),
            store,
            clock,
        }
    }
}

#[async_trait]
impl Module for RateBudget {
    fn name(&self) -> &str {
        "rate_budget"
    }

    fn phases(&self) -> &HashSet<Phase> {
        &self.phases
    }

    fn mode(&self) -> ModuleMode {
        self.mode
    }

    async fn evaluate(&self, event: &CanonicalEvent) -> Result<Decision, ModuleError> {
        let now_ms = self.clock.now_ms();
        let outcome = self
            .store
            .consume_rate_budget(&event.session, now_ms, self.window_ms, self.max_calls)
            .map_err(|e| ModuleError::new(e.to_string()))?;
        if outcome.allowed {
            Ok(Decision::allow(self.name(), format!("within budget: {}/{}", outcome.count, self.max_calls)))
        } else {
            Ok(Decision::deny(
                self.name(),
                format!("rate limit exceeded: {}/{}", outcome.count, self.max_calls),
                Severity::High,
            ))
        }
    }
}
