//! Structural matching of JSON values against a `when` predicate (spec
//! §4.2.2 tool_policy).

use serde_json::Value;

/// `when` matches `actual` when: every key in a `when` mapping appears in
/// `actual` with a recursively-matching value; sequences match pairwise at
/// equal length; scalars match by equality.
pub fn structural_match(when: &Value, actual: &Value) -> bool {
    match (when, actual) {
        (Value::Object(when_map), Value::Object(actual_map)) => when_map
            .iter()
            .all(|(k, v)| actual_map.get(k).is_some_and(|av| structural_match(v, av))),
        (Value::Array(when_items), Value::Array(actual_items)) => {
            when_items.len() == actual_items.len()
                && when_items
                    .iter()
                    .zip(actual_items.iter())
                    .all(|(w, a)| structural_match(w, a))
        }
        (w, a) => w == a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extra_keys_in_actual_are_ignored() {
        let when = json!({"tool": "git"});
        let actual = json!({"tool": "git", "extra": true});
        assert!(structural_match(&when, &actual));
    }

    #[test]
    fn missing_key_fails() {
        let when = json!({"tool": "git"});
        let actual = json!({"other": "x"});
        assert!(!structural_match(&when, &actual));
    }

    #[test]
    fn nested_mapping_matches_recursively() {
        let when = json!({"opts": {"force": true}});
        let actual = json!({"opts": {"force": true, "verbose": true}});
        assert!(structural_match(&when, &actual));
        let actual2 = json!({"opts": {"force": false}});
        assert!(!structural_match(&when, &actual2));
    }

    #[test]
    fn sequences_match_pairwise_at_equal_length() {
        let when = json!({"xs": [1, 2]});
        assert!(structural_match(&when, &json!({"xs": [1, 2]})));
        assert!(!structural_match(&when, &json!({"xs": [1, 2, 3]})));
        assert!(!structural_match(&when, &json!({"xs": [2, 1]})));
    }
}
