//! Audit sinks (spec §4.2.15, §6): file, stdout, webhook, OTLP-JSON. Sink
//! failures never propagate to the caller — they're logged to stderr and,
//! for the file sink, buffered in memory until the next successful write
//! (append-and-flush per line, same discipline as the event log this was
//! generalized from).

use serde_json::{json, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Where one rendered JSON line goes.
pub trait Sink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Synchronous append to a file, with an in-memory fallback buffer flushed
/// on the next successful write.
pub struct FileSink {
    path: PathBuf,
    fallback: Mutex<Vec<String>>,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path, fallback: Mutex::new(Vec::new()) }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl Sink for FileSink {
    fn write_line(&self, line: &str) {
        let mut fallback = self.fallback.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !fallback.is_empty() {
            let mut flushed = Vec::new();
            for buffered in fallback.drain(..) {
                if self.append(&buffered).is_err() {
                    flushed.push(buffered);
                }
            }
            *fallback = flushed;
        }
        if let Err(e) = self.append(line) {
            tracing::error!(error = %e, "audit file sink write failed, buffering");
            fallback.push(line.to_string());
        }
    }
}

/// Writes each line to stdout.
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn write_line(&self, line: &str) {
        println!("{line}");
    }
}

/// Fire-and-forget POST of each line's JSON body.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self { url, client: reqwest::Client::new() }
    }
}

impl Sink for WebhookSink {
    fn write_line(&self, line: &str) {
        let Ok(body): Result<Value, _> = serde_json::from_str(line) else {
            return;
        };
        let url = self.url.clone();
        let client = self.client.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = client.post(&url).json(&body).send().await {
                    tracing::error!(error = %e, url, "audit webhook sink delivery failed");
                }
            });
        } else {
            tracing::error!("audit webhook sink has no tokio runtime to dispatch on");
        }
    }
}

/// Wraps each line in an OTLP-JSON `resourceLogs/scopeLogs/logRecords` envelope
/// and POSTs it the same way as `WebhookSink`.
pub struct OtlpJsonSink {
    inner: WebhookSink,
}

impl OtlpJsonSink {
    pub fn new(url: String) -> Self {
        Self { inner: WebhookSink::new(url) }
    }
}

impl Sink for OtlpJsonSink {
    fn write_line(&self, line: &str) {
        let Ok(body): Result<Value, _> = serde_json::from_str(line) else {
            return;
        };
        let envelope = json!({
            "resourceLogs": [{
                "resource": {
                    "attributes": [
                        { "key": "service.name", "value": { "stringValue": "radius" } }
                    ]
                },
                "scopeLogs": [{
                    "logRecords": [{
                        "body": { "stringValue": body.to_string() },
                        "attributes": [],
                    }]
                }]
            }]
        });
        self.inner.write_line(&envelope.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileSink::new(path.clone());
        sink.write_line(r#"{"a":1}"#);
        sink.write_line(r#"{"a":2}"#);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn file_sink_buffers_then_flushes_on_next_success() {
        let dir = tempfile::tempdir().unwrap();
        let missing_dir_path = dir.path().join("nope").join("audit.jsonl");
        let sink = FileSink::new(missing_dir_path.clone());
        sink.write_line(r#"{"a":1}"#);
        assert_eq!(sink.fallback.lock().unwrap().len(), 1);

        std::fs::create_dir_all(missing_dir_path.parent().unwrap()).unwrap();
        sink.write_line(r#"{"a":2}"#);
        let content = std::fs::read_to_string(&missing_dir_path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(sink.fallback.lock().unwrap().is_empty());
    }

    #[test]
    fn otlp_envelope_carries_service_name_resource_attribute() {
        let body: Value = serde_json::from_str(r#"{"a":1}"#).unwrap();
        let envelope = json!({
            "resourceLogs": [{
                "resource": {
                    "attributes": [
                        { "key": "service.name", "value": { "stringValue": "radius" } }
                    ]
                },
                "scopeLogs": [{
                    "logRecords": [{
                        "body": { "stringValue": body.to_string() },
                        "attributes": [],
                    }]
                }]
            }]
        });
        let attrs = envelope["resourceLogs"][0]["resource"]["attributes"].as_array().unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0]["key"], "service.name");
        assert_eq!(attrs[0]["value"]["stringValue"], "radius");
    }
}
