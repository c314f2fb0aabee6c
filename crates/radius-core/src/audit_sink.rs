//! The seam between the `audit` policy module and the audit recorder
//! (spec §4.2.15): kept as a trait here so `radius-modules` never has to
//! depend on `radius-audit`'s sink implementations directly.

use crate::decision::PipelineResult;
use crate::event::CanonicalEvent;

/// Receives raw events and completed pipeline results for durable recording.
/// Implementations must not block the calling module's phase for longer than
/// a synchronous local append; remote delivery is fire-and-forget.
pub trait AuditSink: Send + Sync {
    /// Called once per event, before the pipeline result is known.
    fn record_event(&self, event: &CanonicalEvent);

    /// Called once per event, after the pipeline has produced a final result.
    fn record_result(&self, event: &CanonicalEvent, result: &PipelineResult);
}
