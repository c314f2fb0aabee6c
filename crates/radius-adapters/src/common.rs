//! Shared helpers for routing-hint extraction and defensive field reads
//! (spec §4.5: "adapters must tolerate malformed input").

use serde_json::{Map, Value};

/// Insert `key` into `metadata` if `value` is present.
pub fn set_metadata_str(metadata: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        metadata.insert(key.to_string(), Value::String(v.to_string()));
    }
}

/// Insert `key` into `metadata` if `value` is present, carrying any JSON shape.
pub fn set_metadata_value(metadata: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        metadata.insert(key.to_string(), v);
    }
}

/// Coerce a session/user identifier that may arrive as a JSON string or
/// number into a plain string, without the surrounding quotes a bare
/// `Value::to_string()` would add.
pub fn stringify_id(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
