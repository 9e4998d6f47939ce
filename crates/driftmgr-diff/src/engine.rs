use std::collections::{HashMap, HashSet};

use driftmgr_core::{ChangeType, DriftChange};
use regex::Regex;
use serde_json::Value;

use crate::canon::content_hash;
use crate::error::DiffError;

type Normalizer = Box<dyn Fn(&Value) -> Value + Send + Sync>;
/// Returns `(equal, explanation)`. `explanation` is surfaced on the
/// resulting [`DriftChange`] when `equal` is false.
type SemanticRule = Box<dyn Fn(&Value, &Value) -> (bool, Option<String>) + Send + Sync>;

/// Tunables for one diff run, keyed by dotted field path (spec §4.3).
#[derive(Default)]
pub struct DiffConfig {
    ignore_patterns: Vec<Regex>,
    normalizers: HashMap<String, Normalizer>,
    semantic_rules: HashMap<String, SemanticRule>,
    order_sensitive: HashSet<String>,
}

impl DiffConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(mut self, pattern: &str) -> Result<Self, DiffError> {
        let re = Regex::new(pattern).map_err(|source| DiffError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.ignore_patterns.push(re);
        Ok(self)
    }

    pub fn normalizer(mut self, path: impl Into<String>, f: Normalizer) -> Self {
        self.normalizers.insert(path.into(), f);
        self
    }

    pub fn semantic_rule(mut self, path: impl Into<String>, f: SemanticRule) -> Self {
        self.semantic_rules.insert(path.into(), f);
        self
    }

    pub fn order_sensitive(mut self, path: impl Into<String>) -> Self {
        self.order_sensitive.insert(path.into());
        self
    }

    fn is_ignored(&self, path: &str) -> bool {
        self.ignore_patterns.iter().any(|re| re.is_match(path))
    }
}

/// Compare `old` (declared/state) against `new` (live) and return every
/// [`DriftChange`] found, in a deterministic order (spec §4.3 tie-break:
/// map keys are iterated sorted).
pub fn diff(old: &Value, new: &Value, config: &DiffConfig) -> Vec<DriftChange> {
    diff_at("", old, new, config)
}

fn diff_at(path: &str, old: &Value, new: &Value, config: &DiffConfig) -> Vec<DriftChange> {
    // step 1: short-circuit on exact equality and ignore pattern.
    if old == new {
        return Vec::new();
    }
    if !path.is_empty() && config.is_ignored(path) {
        return Vec::new();
    }

    // step 2: normalise both sides if a normaliser is registered for this path.
    let (old, new) = match config.normalizers.get(path) {
        Some(f) => (f(old), f(new)),
        None => (old.clone(), new.clone()),
    };
    if old == new {
        return Vec::new();
    }

    // step 3: semantic rule, if registered, replaces structural comparison.
    if let Some(rule) = config.semantic_rules.get(path) {
        let (equal, explanation) = rule(&old, &new);
        if equal {
            return Vec::new();
        }
        let mut change = DriftChange::new(display_path(path), ChangeType::Custom)
            .with_values(Some(old), Some(new));
        if let Some(explanation) = explanation {
            change = change.with_description(explanation);
        }
        return vec![change];
    }

    // step 4: nil handling.
    match (&old, &new) {
        (Value::Null, Value::Null) => return Vec::new(),
        (Value::Null, _) => {
            return vec![DriftChange::new(display_path(path), ChangeType::Added)
                .with_values(None, Some(new))];
        }
        (_, Value::Null) => {
            return vec![DriftChange::new(display_path(path), ChangeType::Removed)
                .with_values(Some(old), None)];
        }
        _ => {}
    }

    // step 5: type mismatch.
    if value_kind(&old) != value_kind(&new) {
        return vec![DriftChange::new(display_path(path), ChangeType::TypeChanged)
            .with_values(Some(old), Some(new))];
    }

    match (&old, &new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            diff_maps(path, old_map, new_map, config)
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            if config.order_sensitive.contains(path) {
                diff_ordered_list(path, old_items, new_items, config)
            } else {
                diff_unordered_list(path, old_items, new_items)
            }
        }
        _ => {
            // step 10: scalars.
            vec![DriftChange::new(display_path(path), ChangeType::Modified)
                .with_values(Some(old), Some(new))]
        }
    }
}

fn diff_maps(
    path: &str,
    old_map: &serde_json::Map<String, Value>,
    new_map: &serde_json::Map<String, Value>,
    config: &DiffConfig,
) -> Vec<DriftChange> {
    let mut changes = Vec::new();
    let mut keys: Vec<&String> = old_map.keys().chain(new_map.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let child_path = join_path(path, key);
        match (old_map.get(key), new_map.get(key)) {
            (Some(o), Some(n)) => changes.extend(diff_at(&child_path, o, n, config)),
            (Some(o), None) => {
                changes.push(
                    DriftChange::new(display_path(&child_path), ChangeType::Removed)
                        .with_values(Some(o.clone()), None),
                );
            }
            (None, Some(n)) => {
                changes.push(
                    DriftChange::new(display_path(&child_path), ChangeType::Added)
                        .with_values(None, Some(n.clone())),
                );
            }
            (None, None) => unreachable!("key came from one of the two maps"),
        }
    }
    changes
}

fn diff_ordered_list(
    path: &str,
    old_items: &[Value],
    new_items: &[Value],
    config: &DiffConfig,
) -> Vec<DriftChange> {
    let mut changes = Vec::new();
    let common = old_items.len().min(new_items.len());
    for i in 0..common {
        let child_path = format!("{}[{}]", path, i);
        changes.extend(diff_at(&child_path, &old_items[i], &new_items[i], config));
    }
    for (i, item) in old_items.iter().enumerate().skip(common) {
        changes.push(
            DriftChange::new(format!("{}[{}]", display_path(path), i), ChangeType::Removed)
                .with_values(Some(item.clone()), None),
        );
    }
    for (i, item) in new_items.iter().enumerate().skip(common) {
        changes.push(
            DriftChange::new(format!("{}[{}]", display_path(path), i), ChangeType::Added)
                .with_values(None, Some(item.clone())),
        );
    }
    changes
}

fn diff_unordered_list(path: &str, old_items: &[Value], new_items: &[Value]) -> Vec<DriftChange> {
    let old_hashes: HashSet<String> = old_items.iter().map(content_hash).collect();
    let new_hashes: HashSet<String> = new_items.iter().map(content_hash).collect();

    let mut changes = Vec::new();
    for item in old_items {
        if !new_hashes.contains(&content_hash(item)) {
            changes.push(
                DriftChange::new(display_path(path), ChangeType::ItemRemoved)
                    .with_values(Some(item.clone()), None),
            );
        }
    }
    for item in new_items {
        if !old_hashes.contains(&content_hash(item)) {
            changes.push(
                DriftChange::new(display_path(path), ChangeType::ItemAdded)
                    .with_values(None, Some(item.clone())),
            );
        }
    }
    changes
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

fn value_kind(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_values_produce_no_changes() {
        let v = json!({"a": 1, "b": [1, 2, 3]});
        assert!(diff(&v, &v, &DiffConfig::new()).is_empty());
    }

    #[test]
    fn scalar_mismatch_emits_modified() {
        let changes = diff(&json!(1), &json!(2), &DiffConfig::new());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Modified);
    }

    #[test]
    fn null_to_value_emits_added() {
        let changes = diff(&Value::Null, &json!("x"), &DiffConfig::new());
        assert_eq!(changes[0].change_type, ChangeType::Added);
    }

    #[test]
    fn value_to_null_emits_removed() {
        let changes = diff(&json!("x"), &Value::Null, &DiffConfig::new());
        assert_eq!(changes[0].change_type, ChangeType::Removed);
    }

    #[test]
    fn type_mismatch_emits_type_changed_without_recursion() {
        let changes = diff(&json!("x"), &json!(1), &DiffConfig::new());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::TypeChanged);
    }

    #[test]
    fn map_key_added_and_removed() {
        let old = json!({"a": 1});
        let new = json!({"b": 2});
        let mut changes = diff(&old, &new, &DiffConfig::new());
        changes.sort_by(|a, b| a.field.cmp(&b.field));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, "a");
        assert_eq!(changes[0].change_type, ChangeType::Removed);
        assert_eq!(changes[1].field, "b");
        assert_eq!(changes[1].change_type, ChangeType::Added);
    }

    #[test]
    fn map_recurses_into_shared_keys() {
        let old = json!({"tags": {"env": "prod"}});
        let new = json!({"tags": {"env": "staging"}});
        let changes = diff(&old, &new, &DiffConfig::new());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "tags.env");
        assert_eq!(changes[0].change_type, ChangeType::Modified);
    }

    #[test]
    fn ordered_list_pairs_by_index() {
        let config = DiffConfig::new().order_sensitive("items");
        let old = json!({"items": [1, 2]});
        let new = json!({"items": [1, 3, 4]});
        let mut changes = diff(&old, &new, &config);
        changes.sort_by(|a, b| a.field.cmp(&b.field));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, "items[1]");
        assert_eq!(changes[0].change_type, ChangeType::Modified);
        assert_eq!(changes[1].field, "items[2]");
        assert_eq!(changes[1].change_type, ChangeType::Added);
    }

    #[test]
    fn unordered_list_ignores_reordering() {
        let old = json!({"rules": [{"port": 80}, {"port": 443}]});
        let new = json!({"rules": [{"port": 443}, {"port": 80}]});
        assert!(diff(&old, &new, &DiffConfig::new()).is_empty());
    }

    #[test]
    fn unordered_list_detects_content_changes() {
        let old = json!({"rules": [{"port": 80}]});
        let new = json!({"rules": [{"port": 22}]});
        let changes = diff(&old, &new, &DiffConfig::new());
        assert_eq!(changes.len(), 2);
        let types: HashSet<ChangeType> = changes.iter().map(|c| c.change_type).collect();
        assert!(types.contains(&ChangeType::ItemRemoved));
        assert!(types.contains(&ChangeType::ItemAdded));
    }

    #[test]
    fn ignore_pattern_prunes_before_recursion() {
        let config = DiffConfig::new().ignore(r"^metadata\.").unwrap();
        let old = json!({"metadata": {"etag": "a"}, "name": "x"});
        let new = json!({"metadata": {"etag": "b"}, "name": "x"});
        assert!(diff(&old, &new, &config).is_empty());
    }

    #[test]
    fn semantic_rule_replaces_structural_comparison() {
        let config = DiffConfig::new().semantic_rule(
            "policy",
            Box::new(|_old, _new| (true, Some("policies are semantically equivalent".into()))),
        );
        let old = json!({"policy": {"Version": "2012-10-17"}});
        let new = json!({"policy": {"Version": "2012-10-17", "Id": "x"}});
        assert!(diff(&old, &new, &config).is_empty());
    }

    #[test]
    fn normalizer_runs_before_comparison() {
        let config = DiffConfig::new().normalizer(
            "cidr",
            Box::new(|v| match v.as_str() {
                Some("0.0.0.0/0") => json!("::/0"),
                _ => v.clone(),
            }),
        );
        let old = json!({"cidr": "0.0.0.0/0"});
        let new = json!({"cidr": "::/0"});
        assert!(diff(&old, &new, &config).is_empty());
    }

    #[test]
    fn result_order_is_deterministic_across_runs() {
        let old = json!({"z": 1, "a": 2, "m": 3});
        let new = json!({"z": 10, "a": 20, "m": 30});
        let first: Vec<String> = diff(&old, &new, &DiffConfig::new()).into_iter().map(|c| c.field).collect();
        let second: Vec<String> = diff(&old, &new, &DiffConfig::new()).into_iter().map(|c| c.field).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["a".to_string(), "m".to_string(), "z".to_string()]);
    }
}
