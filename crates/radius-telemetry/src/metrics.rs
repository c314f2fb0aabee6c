//! Atomic decision counters, one per final action. Process-wide, cheap to
//! snapshot, no locking on the hot path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use radius_core::{Action, CanonicalEvent, PipelineResult};

use crate::observer::DecisionObserver;

/// A snapshot of counts per final action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionCounts {
    pub allow: u64,
    pub deny: u64,
    pub modify: u64,
    pub challenge: u64,
    pub alert: u64,
}

/// Process-wide counters, cheap to clone (shares the underlying atomics).
#[derive(Clone, Default)]
pub struct DecisionMetrics {
    allow: Arc<AtomicU64>,
    deny: Arc<AtomicU64>,
    modify: Arc<AtomicU64>,
    challenge: Arc<AtomicU64>,
    alert: Arc<AtomicU64>,
}

impl DecisionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, action: Action) {
        let counter = match action {
            Action::Allow => &self.allow,
            Action::Deny => &self.deny,
            Action::Modify => &self.modify,
            Action::Challenge => &self.challenge,
            Action::Alert => &self.alert,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DecisionCounts {
        DecisionCounts {
            allow: self.allow.load(Ordering::Relaxed),
            deny: self.deny.load(Ordering::Relaxed),
            modify: self.modify.load(Ordering::Relaxed),
            challenge: self.challenge.load(Ordering::Relaxed),
            alert: self.alert.load(Ordering::Relaxed),
        }
    }
}

/// Wraps `DecisionMetrics` as a `DecisionObserver`, incrementing the final
/// action's counter for every pipeline result.
#[derive(Clone, Default)]
pub struct MetricsObserver {
    pub metrics: DecisionMetrics,
}

impl DecisionObserver for MetricsObserver {
    fn on_decision(&self, _event: &CanonicalEvent, result: &PipelineResult) {
        self.metrics.record(result.final_action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::Framework;

    #[test]
    fn records_final_action_and_snapshots() {
        let observer = MetricsObserver::default();
        let event = CanonicalEvent::new(radius_core::Phase::PreTool, Framework::Generic);
        observer.on_decision(&event, &PipelineResult::default_action(Action::Deny, "x"));
        observer.on_decision(&event, &PipelineResult::default_action(Action::Allow, "x"));
        let snapshot = observer.metrics.snapshot();
        assert_eq!(snapshot.deny, 1);
        assert_eq!(snapshot.allow, 1);
    }
}
