//! Stable JSON serialization and fingerprinting (spec §4.2.9 repetition_guard).

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Render `value` with object keys sorted ascending, so two structurally
/// equal values with differently-ordered keys hash identically.
pub fn stable_json_string(value: &Value) -> String {
    let mut out = String::new();
    write_stable(value, &mut out);
    out
}

fn write_stable(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(k).unwrap_or_default());
                out.push(':');
                write_stable(&map[*k], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// SHA-256 of `"{tool_name}:{stable_json(arguments)}"`, hex-encoded.
pub fn fingerprint(tool_name: &str, arguments: &Value) -> String {
    let payload = format!("{tool_name}:{}", stable_json_string(arguments));
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_fingerprint() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(fingerprint("Bash", &a), fingerprint("Bash", &b));
    }

    #[test]
    fn different_tool_names_fingerprint_differently() {
        let args = json!({"x": 1});
        assert_ne!(fingerprint("Bash", &args), fingerprint("Read", &args));
    }
}
