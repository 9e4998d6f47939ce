use std::collections::HashMap;

use chrono::Utc;
use driftmgr_core::{ChangeType, DriftChange, DriftType, Resource, Severity};
use serde_json::{json, Value};

use crate::rules::{DetectorConfig, ROOT_FIELD};

/// Reconciles declared (`state`) vs live resources and classifies each drift
/// (spec §4.4). Resources on either side are keyed by `id`; ids present on
/// only one side never reach the per-resource comparison path.
pub fn detect_drift(state: &[Resource], live: &[Resource], config: &DetectorConfig) -> Vec<driftmgr_core::DriftResult> {
    let state_map: HashMap<&str, &Resource> = state.iter().map(|r| (r.id.as_str(), r)).collect();
    let live_map: HashMap<&str, &Resource> = live.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut results = Vec::new();

    let mut missing_ids: Vec<&str> = state_map.keys().filter(|id| !live_map.contains_key(*id)).copied().collect();
    missing_ids.sort_unstable();
    for id in missing_ids {
        results.push(missing_result(state_map[id], config));
    }

    let mut extra_ids: Vec<&str> = live_map.keys().filter(|id| !state_map.contains_key(*id)).copied().collect();
    extra_ids.sort_unstable();
    for id in extra_ids {
        results.push(extra_result(live_map[id], config));
    }

    let mut common_ids: Vec<&str> = state_map.keys().filter(|id| live_map.contains_key(*id)).copied().collect();
    common_ids.sort_unstable();
    for id in common_ids {
        if let Some(result) = modified_result(state_map[id], live_map[id], config) {
            results.push(result);
        }
    }

    results
}

fn missing_result(r: &Resource, config: &DetectorConfig) -> driftmgr_core::DriftResult {
    let severity = config.severity_for(&r.resource_type, &[], Severity::High);
    driftmgr_core::DriftResult {
        resource_id: r.id.clone(),
        resource_name: r.name.clone(),
        resource_type: r.resource_type.clone(),
        provider: r.provider.clone(),
        region: r.region.clone(),
        drift_type: DriftType::Missing,
        severity,
        description: format!("resource '{}' ({}) is declared but not present in live infrastructure", r.name, r.id),
        risk_reasoning: risk_reasoning(DriftType::Missing, severity, &r.resource_type, &[]),
        changes: Vec::new(),
        detected_at: Utc::now(),
    }
}

fn extra_result(r: &Resource, config: &DetectorConfig) -> driftmgr_core::DriftResult {
    let severity = config.severity_for(&r.resource_type, &[], Severity::Medium);
    driftmgr_core::DriftResult {
        resource_id: r.id.clone(),
        resource_name: r.name.clone(),
        resource_type: r.resource_type.clone(),
        provider: r.provider.clone(),
        region: r.region.clone(),
        drift_type: DriftType::Extra,
        severity,
        description: format!("resource '{}' ({}) exists in live infrastructure but is not declared", r.name, r.id),
        risk_reasoning: risk_reasoning(DriftType::Extra, severity, &r.resource_type, &[]),
        changes: Vec::new(),
        detected_at: Utc::now(),
    }
}

fn modified_result(state: &Resource, live: &Resource, config: &DetectorConfig) -> Option<driftmgr_core::DriftResult> {
    let mut changes = Vec::new();

    for (field, s, l) in [("name", &state.name, &live.name), ("region", &state.region, &live.region), ("state", &state.state, &live.state)] {
        if s != l {
            changes.push(DriftChange::new(field, ChangeType::Modified).with_values(Some(json!(s)), Some(json!(l))));
        }
    }

    changes.extend(tag_changes(&state.tags, &live.tags, config));

    if !state.attributes.is_empty() || !live.attributes.is_empty() {
        let old = attributes_to_value(&state.attributes);
        let new = attributes_to_value(&live.attributes);
        changes.extend(driftmgr_diff::diff(&old, &new, config.diff_config()));
    }

    if changes.is_empty() {
        return None;
    }

    let severity = config.severity_for(&state.resource_type, &changes, Severity::from_change_count(changes.len()));
    Some(driftmgr_core::DriftResult {
        resource_id: state.id.clone(),
        resource_name: live.name.clone(),
        resource_type: state.resource_type.clone(),
        provider: state.provider.clone(),
        region: live.region.clone(),
        drift_type: DriftType::Modified,
        severity,
        description: format!("{} attribute change(s) detected for '{}' ({})", changes.len(), live.name, state.id),
        risk_reasoning: risk_reasoning(DriftType::Modified, severity, &state.resource_type, &changes),
        changes,
        detected_at: Utc::now(),
    })
}

fn attributes_to_value(attrs: &HashMap<String, Value>) -> Value {
    Value::Object(attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// Tag comparison rules (spec §4.4): ignored tags are suppressed first;
/// missing-in-live tags always emit; present-in-both diffs only emit when
/// the key is marked sensitive; extra-in-live tags always emit.
fn tag_changes(state_tags: &HashMap<String, String>, live_tags: &HashMap<String, String>, config: &DetectorConfig) -> Vec<DriftChange> {
    let mut changes = Vec::new();
    let mut keys: Vec<&String> = state_tags.keys().chain(live_tags.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        if config.is_ignored_tag(key) {
            continue;
        }
        let path = format!("tags.{}", key);
        match (state_tags.get(key), live_tags.get(key)) {
            (Some(s), None) => {
                changes.push(DriftChange::new(path, ChangeType::Missing).with_values(Some(json!(s)), None));
            }
            (Some(s), Some(l)) if s != l => {
                if config.is_sensitive_tag(key) {
                    changes.push(DriftChange::new(path, ChangeType::Modified).with_values(Some(json!(s)), Some(json!(l))));
                }
            }
            (None, Some(l)) => {
                changes.push(DriftChange::new(path, ChangeType::Extra).with_values(None, Some(json!(l))));
            }
            _ => {}
        }
    }
    changes
}

/// Semicolon-separated risk clauses (spec §4.4): one for drift type, one for
/// severity, one per notable resource type, one per change on a sensitive or
/// well-known field. Clauses are only emitted when applicable.
fn risk_reasoning(drift_type: DriftType, severity: Severity, resource_type: &str, changes: &[DriftChange]) -> String {
    let mut clauses = vec![drift_type_clause(drift_type, changes.len()), format!("severity: {}", severity)];
    if let Some(c) = resource_type_clause(resource_type) {
        clauses.push(c);
    }
    for change in changes {
        if let Some(c) = sensitive_field_clause(&change.field) {
            clauses.push(c);
        }
    }
    clauses.join("; ")
}

fn drift_type_clause(drift_type: DriftType, change_count: usize) -> String {
    match drift_type {
        DriftType::Missing => "declared resource is missing from live infrastructure".to_string(),
        DriftType::Extra => "undeclared resource present in live infrastructure".to_string(),
        DriftType::Modified => format!("{} attribute change(s) detected relative to declared state", change_count),
    }
}

fn resource_type_clause(resource_type: &str) -> Option<String> {
    let rt = resource_type.to_lowercase();
    if rt.contains("security_group") {
        Some("security group changes can affect network exposure".to_string())
    } else if rt.contains("db") || rt.contains("rds") || rt.contains("database") {
        Some("database configuration drift may affect data integrity or availability".to_string())
    } else if rt.contains("instance") {
        Some("compute instance drift may affect running workloads".to_string())
    } else {
        None
    }
}

fn sensitive_field_clause(field: &str) -> Option<String> {
    if field == ROOT_FIELD {
        return None;
    }
    if field == "tags.environment" {
        Some("environment tag changed".to_string())
    } else if field == "tags.owner" {
        Some("owner tag changed".to_string())
    } else if field.contains("security_group") {
        Some(format!("security group membership changed ({})", field))
    } else if field.contains("iam_polic") {
        Some(format!("IAM policy changed ({})", field))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, name: &str, rtype: &str, region: &str) -> Resource {
        Resource::new(id, name, rtype, "aws").with_region(region)
    }

    #[test]
    fn missing_resource_scenario_1() {
        let state = vec![resource("i-1", "web", "aws_instance", "us-east-1")];
        let results = detect_drift(&state, &[], &DetectorConfig::new());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].drift_type, DriftType::Missing);
        assert_eq!(results[0].severity, Severity::High);
        assert_eq!(results[0].resource_id, "i-1");
    }

    #[test]
    fn extra_resource_scenario_2() {
        let live = vec![resource("bucket-42", "bucket-42", "aws_s3_bucket", "us-east-1")];
        let results = detect_drift(&[], &live, &DetectorConfig::new());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].drift_type, DriftType::Extra);
        assert_eq!(results[0].severity, Severity::Medium);
    }

    #[test]
    fn tag_only_drift_sensitive_scenario_3() {
        let mut s = resource("i-1", "web", "aws_instance", "us-east-1");
        s.tags.insert("environment".into(), "prod".into());
        let mut l = s.clone();
        l.tags.insert("environment".into(), "staging".into());

        let config = DetectorConfig::new().sensitive_tag("environment");
        let results = detect_drift(&[s], &[l], &config);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].drift_type, DriftType::Modified);
        assert_eq!(results[0].severity, Severity::Medium);
        assert_eq!(results[0].changes.len(), 1);
        assert_eq!(results[0].changes[0].field, "tags.environment");
        assert_eq!(results[0].changes[0].change_type, ChangeType::Modified);
        assert_eq!(results[0].changes[0].old_value, Some(json!("prod")));
        assert_eq!(results[0].changes[0].new_value, Some(json!("staging")));
    }

    #[test]
    fn tag_only_drift_non_sensitive_scenario_4() {
        let mut s = resource("i-1", "web", "aws_instance", "us-east-1");
        s.tags.insert("environment".into(), "prod".into());
        let mut l = s.clone();
        l.tags.insert("environment".into(), "staging".into());

        let results = detect_drift(&[s], &[l], &DetectorConfig::new());
        assert!(results.is_empty());
    }

    #[test]
    fn ignored_tag_scenario_5() {
        let mut s = resource("i-1", "web", "aws_instance", "us-east-1");
        s.tags.insert("managed-by".into(), "driftmgr".into());
        let l = resource("i-1", "web", "aws_instance", "us-east-1");

        let config = DetectorConfig::new().ignored_tag("managed-by");
        let results = detect_drift(&[s], &[l], &config);
        assert!(results.is_empty());
    }

    #[test]
    fn basic_attribute_change_detected() {
        let s = resource("i-1", "web", "aws_instance", "us-east-1");
        let l = resource("i-1", "web", "aws_instance", "us-west-2");
        let results = detect_drift(&[s], &[l], &DetectorConfig::new());
        assert_eq!(results.len(), 1);
        assert!(results[0].changes.iter().any(|c| c.field == "region"));
    }

    #[test]
    fn identical_resources_produce_no_drift() {
        let r = resource("i-1", "web", "aws_instance", "us-east-1");
        let results = detect_drift(&[r.clone()], &[r], &DetectorConfig::new());
        assert!(results.is_empty());
    }

    #[test]
    fn risk_reasoning_includes_drift_type_and_severity_clauses() {
        let state = vec![resource("i-1", "web", "aws_instance", "us-east-1")];
        let results = detect_drift(&state, &[], &DetectorConfig::new());
        assert!(results[0].risk_reasoning.contains("missing"));
        assert!(results[0].risk_reasoning.contains("severity: high"));
    }

    #[test]
    fn attributes_diff_flows_through_deep_diff_engine() {
        let mut s = resource("sg-1", "web-sg", "aws_security_group", "us-east-1");
        s.attributes.insert("ingress".to_string(), json!([{"port": 22}]));
        let mut l = s.clone();
        l.attributes.insert("ingress".to_string(), json!([{"port": 443}]));

        let results = detect_drift(&[s], &[l], &DetectorConfig::new());
        assert_eq!(results.len(), 1);
        assert!(results[0].changes.iter().any(|c| c.field == "ingress"));
    }
}
