//! Deep-merge of JSON values, used for `modify` patch composition (spec §4.1,
//! P3) and reused by `radius-config` for defaults/profile/user-doc layering.

use serde_json::Value;

/// Merge `b` onto `a`: mapping-valued keys merge recursively, every other
/// type (scalars, sequences) is replaced wholesale by `b`'s value. `b`'s
/// keys win on conflict, matching spec.md's "later patches override earlier
/// ones" rule.
pub fn deep_merge(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Object(map_a), Value::Object(map_b)) => {
            let mut merged = map_a.clone();
            for (key, value_b) in map_b {
                let new_value = match merged.get(key) {
                    Some(value_a) => deep_merge(value_a, value_b),
                    None => value_b.clone(),
                };
                merged.insert(key.clone(), new_value);
            }
            Value::Object(merged)
        }
        (_, b_other) => b_other.clone(),
    }
}

/// Fold a sequence of patches with [`deep_merge`], left to right.
pub fn deep_merge_all<'a, I>(values: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    values
        .into_iter()
        .fold(Value::Object(serde_json::Map::new()), |acc, v| {
            deep_merge(&acc, v)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_are_replaced() {
        let a = json!({"x": 1});
        let b = json!({"x": 2});
        assert_eq!(deep_merge(&a, &b), json!({"x": 2}));
    }

    #[test]
    fn nested_maps_merge_recursively() {
        let a = json!({"a": {"x": 1, "y": 2}});
        let b = json!({"a": {"y": 3, "z": 4}});
        assert_eq!(deep_merge(&a, &b), json!({"a": {"x": 1, "y": 3, "z": 4}}));
    }

    #[test]
    fn sequences_are_replaced_not_concatenated() {
        let a = json!({"xs": [1, 2, 3]});
        let b = json!({"xs": [4]});
        assert_eq!(deep_merge(&a, &b), json!({"xs": [4]}));
    }

    #[test]
    fn associative_on_disjoint_keys() {
        let a = json!({"a": {"k1": 1}});
        let b = json!({"a": {"k2": 2}});
        let c = json!({"a": {"k3": 3}});
        let left = deep_merge(&deep_merge(&a, &b), &c);
        let right = deep_merge(&a, &deep_merge(&b, &c));
        assert_eq!(left, right);
    }
}
