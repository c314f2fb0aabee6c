//! `${NAME}` template expansion over string values (spec §4.4).

use radius_core::CoreError;
use serde_json::Value;
use std::collections::HashMap;

/// Policy for an undefined template variable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnUndefinedTemplateVar {
    Error,
    Empty,
}

impl OnUndefinedTemplateVar {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "error" => Ok(Self::Error),
            "empty" => Ok(Self::Empty),
            other => Err(CoreError::Invalid(format!(
                "onUndefinedTemplateVar must be error or empty, got {other}"
            ))),
        }
    }
}

/// Recursively replace every `${NAME}` occurrence in string leaves of `value`.
pub fn expand_templates(
    value: &Value,
    vars: &HashMap<String, String>,
    on_undefined: OnUndefinedTemplateVar,
) -> Result<Value, CoreError> {
    match value {
        Value::String(s) => Ok(Value::String(expand_str(s, vars, on_undefined)?)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(expand_templates(item, vars, on_undefined)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), expand_templates(v, vars, on_undefined)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn expand_str(
    input: &str,
    vars: &HashMap<String, String>,
    on_undefined: OnUndefinedTemplateVar,
) -> Result<String, CoreError> {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(end) = input[i + 2..].find('}') {
                let name = &input[i + 2..i + 2 + end];
                match vars.get(name) {
                    Some(v) => out.push_str(v),
                    None => match on_undefined {
                        OnUndefinedTemplateVar::Error => {
                            return Err(CoreError::UndefinedTemplateVar(name.to_string()));
                        }
                        OnUndefinedTemplateVar::Empty => {}
                    },
                }
                i += 2 + end + 1;
                continue;
            }
        }
        let ch_len = input[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        out.push_str(&input[i..i + ch_len]);
        i += ch_len;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("workspace".to_string(), "/ws".to_string());
        m.insert("HOME".to_string(), "/home/agent".to_string());
        m
    }

    #[test]
    fn substitutes_known_vars() {
        let v = json!({"path": "${workspace}/skills", "home": "${HOME}"});
        let out = expand_templates(&v, &vars(), OnUndefinedTemplateVar::Error).unwrap();
        assert_eq!(out, json!({"path": "/ws/skills", "home": "/home/agent"}));
    }

    #[test]
    fn undefined_var_errors_when_policy_is_error() {
        let v = json!("${MISSING}");
        let err = expand_templates(&v, &vars(), OnUndefinedTemplateVar::Error);
        assert!(err.is_err());
    }

    #[test]
    fn undefined_var_becomes_empty_when_policy_is_empty() {
        let v = json!("prefix-${MISSING}-suffix");
        let out = expand_templates(&v, &vars(), OnUndefinedTemplateVar::Empty).unwrap();
        assert_eq!(out, json!("prefix--suffix"));
    }
}
