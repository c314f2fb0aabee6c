//! Audit recording (spec §4.2.15): renders every event and pipeline result
//! to a JSON line and fans it out to configured sinks.

pub mod entry;
pub mod recorder;
pub mod sinks;

pub use entry::{AuditEntry, EntryKind};
pub use recorder::Recorder;
pub use sinks::{FileSink, OtlpJsonSink, Sink, StdoutSink, WebhookSink};
