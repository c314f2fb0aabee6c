//! `Recorder`: the concrete `radius_core::AuditSink` wired by the runtime,
//! fanning every event/result out to whichever sinks the `audit` config
//! section names (spec §4.2.15, §6).

use radius_core::{AuditSink, CanonicalEvent, PipelineResult};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::entry::AuditEntry;
use crate::sinks::{FileSink, OtlpJsonSink, Sink, StdoutSink, WebhookSink};

const DEFAULT_FILE_PATH: &str = "./radius-audit.jsonl";

/// Fans every recorded entry out to the configured sinks. Never blocks the
/// caller on remote delivery; only the file sink writes synchronously.
pub struct Recorder {
    sinks: Vec<Arc<dyn Sink>>,
    include_arguments: bool,
    include_results: bool,
}

impl Recorder {
    /// Build from the `audit` configuration section (spec §4.2.15, §6):
    /// `file`, `includeArguments`, `includeResults`, `webhookUrl`, `otlpUrl`,
    /// and `sinks` — either bare type names (`["file", "stdout"]`) or rich
    /// per-sink objects (`[{type, path|url}]`). Defaults to a single file
    /// sink at `./radius-audit.jsonl` when `sinks` is absent or empty.
    pub fn from_config(cfg: &Value) -> Self {
        let default_path = cfg.get("file").and_then(Value::as_str).unwrap_or(DEFAULT_FILE_PATH).to_string();
        let configured = cfg.get("sinks").and_then(Value::as_array);
        let sinks: Vec<Arc<dyn Sink>> = match configured {
            Some(entries) if !entries.is_empty() => {
                entries.iter().filter_map(|e| sink_from_config(e, cfg, &default_path)).collect()
            }
            _ => vec![Arc::new(FileSink::new(PathBuf::from(default_path)))],
        };
        Self {
            sinks,
            include_arguments: cfg.get("includeArguments").and_then(Value::as_bool).unwrap_or(true),
            include_results: cfg.get("includeResults").and_then(Value::as_bool).unwrap_or(true),
        }
    }

    fn dispatch(&self, entry: &AuditEntry) {
        let Ok(line) = serde_json::to_string(entry) else {
            return;
        };
        for sink in &self.sinks {
            sink.write_line(&line);
        }
    }
}

fn sink_from_config(entry: &Value, parent_cfg: &Value, default_path: &str) -> Option<Arc<dyn Sink>> {
    let kind = entry.as_str().map(str::to_string).or_else(|| {
        entry.get("type").and_then(Value::as_str).map(str::to_string)
    })?;
    match kind.as_str() {
        "file" => {
            let path = entry.get("path").and_then(Value::as_str).unwrap_or(default_path);
            Some(Arc::new(FileSink::new(PathBuf::from(path))))
        }
        "stdout" => Some(Arc::new(StdoutSink)),
        "webhook" => {
            let url = entry
                .get("url")
                .and_then(Value::as_str)
                .or_else(|| parent_cfg.get("webhookUrl").and_then(Value::as_str))?
                .to_string();
            Some(Arc::new(WebhookSink::new(url)))
        }
        "otlp_json" => {
            let url = entry
                .get("url")
                .and_then(Value::as_str)
                .or_else(|| parent_cfg.get("otlpUrl").and_then(Value::as_str))?
                .to_string();
            Some(Arc::new(OtlpJsonSink::new(url)))
        }
        _ => None,
    }
}

impl AuditSink for Recorder {
    fn record_event(&self, event: &CanonicalEvent) {
        self.dispatch(&AuditEntry::for_event(event, self.include_arguments, self.include_results));
    }

    fn record_result(&self, event: &CanonicalEvent, result: &PipelineResult) {
        self.dispatch(&AuditEntry::for_result(event, result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::{Action, Framework, Phase, PipelineResult};
    use serde_json::json;

    #[test]
    fn default_config_writes_to_default_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let cfg = json!({"sinks": [{"type": "file", "path": path.to_string_lossy()}]});
        let recorder = Recorder::from_config(&cfg);
        let event = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        recorder.record_event(&event);
        let result = PipelineResult::default_action(Action::Allow, "ok");
        recorder.record_result(&event, &result);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
