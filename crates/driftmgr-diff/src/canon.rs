use std::collections::BTreeMap;

use md5::{Digest, Md5};
use serde_json::Value;

/// Recursively sort object keys into a `BTreeMap` so that two values which
/// are structurally equal but were built with different key insertion order
/// serialise identically.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), sort_keys(v))).collect();
            serde_json::to_value(sorted).expect("sorted map serialises")
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Stable-serialise `value` then MD5 it, used to content-address elements of
/// an order-insensitive list (spec §4.3 step 8).
pub fn content_hash(value: &Value) -> String {
    let canonical = sort_keys(value);
    let bytes = serde_json::to_vec(&canonical).expect("canonical value serialises");
    let mut hasher = Md5::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_independent_of_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn hash_differs_for_different_content() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
