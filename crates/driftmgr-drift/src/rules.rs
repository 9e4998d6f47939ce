use std::collections::HashSet;

use driftmgr_core::{DriftChange, Severity};
use driftmgr_diff::DiffConfig;
use regex::Regex;

/// A resource-type + attribute-path rule that, when matched, short-circuits
/// the count-based severity fallback (spec §4.4 "Severity assignment").
pub struct SeverityRule {
    resource_type: Option<Regex>,
    field_pattern: Regex,
    severity: Severity,
}

impl SeverityRule {
    pub fn new(field_pattern: &str, severity: Severity) -> Result<Self, regex::Error> {
        Ok(Self {
            resource_type: None,
            field_pattern: Regex::new(field_pattern)?,
            severity,
        })
    }

    pub fn for_resource_type(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.resource_type = Some(Regex::new(pattern)?);
        Ok(self)
    }

    fn matches(&self, resource_type: &str, field: &str) -> bool {
        let type_ok = self.resource_type.as_ref().map_or(true, |re| re.is_match(resource_type));
        type_ok && self.field_pattern.is_match(field)
    }
}

/// A synthetic field name used to consult severity rules for `missing`/`extra`
/// drift, which have no per-field changes to match against.
pub const ROOT_FIELD: &str = "<root>";

/// Tunables for one detection run (spec §4.4): severity rules, sensitive/
/// ignored tag keys, and a [`DiffConfig`] reused for comparing each
/// resource's schemaless `attributes` bag — this doubles as the detector's
/// "registered custom comparators (path -> predicate)" extension point,
/// since `DiffConfig` already carries semantic rules and normalizers.
#[derive(Default)]
pub struct DetectorConfig {
    severity_rules: Vec<SeverityRule>,
    sensitive_tags: HashSet<String>,
    ignored_tags: HashSet<String>,
    diff_config: DiffConfig,
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn severity_rule(mut self, rule: SeverityRule) -> Self {
        self.severity_rules.push(rule);
        self
    }

    pub fn sensitive_tag(mut self, key: impl Into<String>) -> Self {
        self.sensitive_tags.insert(key.into());
        self
    }

    pub fn ignored_tag(mut self, key: impl Into<String>) -> Self {
        self.ignored_tags.insert(key.into());
        self
    }

    pub fn with_diff_config(mut self, diff_config: DiffConfig) -> Self {
        self.diff_config = diff_config;
        self
    }

    pub(crate) fn diff_config(&self) -> &DiffConfig {
        &self.diff_config
    }

    pub(crate) fn is_sensitive_tag(&self, key: &str) -> bool {
        self.sensitive_tags.contains(key)
    }

    pub(crate) fn is_ignored_tag(&self, key: &str) -> bool {
        self.ignored_tags.contains(key)
    }

    /// Rules first, short-circuit; count-based fallback only when no rule
    /// matches (spec §4.4, and §9 Open Question: resolved with no further
    /// ambiguity — rules always take priority).
    pub(crate) fn severity_for(&self, resource_type: &str, changes: &[DriftChange], default: Severity) -> Severity {
        if changes.is_empty() {
            for rule in &self.severity_rules {
                if rule.matches(resource_type, ROOT_FIELD) {
                    return rule.severity;
                }
            }
            return default;
        }
        for rule in &self.severity_rules {
            if changes.iter().any(|c| rule.matches(resource_type, &c.field)) {
                return rule.severity;
            }
        }
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftmgr_core::ChangeType;

    #[test]
    fn rule_short_circuits_count_fallback() {
        let config = DetectorConfig::new()
            .severity_rule(SeverityRule::new(r"^tags\.environment$", Severity::Critical).unwrap());
        let changes = vec![DriftChange::new("tags.environment", ChangeType::Modified)];
        let severity = config.severity_for("aws_instance", &changes, Severity::from_change_count(1));
        assert_eq!(severity, Severity::Critical);
    }

    #[test]
    fn no_matching_rule_falls_back_to_count() {
        let config = DetectorConfig::new()
            .severity_rule(SeverityRule::new(r"^tags\.owner$", Severity::Critical).unwrap());
        let changes = vec![DriftChange::new("tags.environment", ChangeType::Modified)];
        let severity = config.severity_for("aws_instance", &changes, Severity::from_change_count(1));
        assert_eq!(severity, Severity::Medium);
    }

    #[test]
    fn resource_type_filter_is_respected() {
        let rule = SeverityRule::new(r".*", Severity::Critical)
            .unwrap()
            .for_resource_type("^aws_db_instance$")
            .unwrap();
        let config = DetectorConfig::new().severity_rule(rule);
        let changes = vec![DriftChange::new("name", ChangeType::Modified)];
        assert_eq!(
            config.severity_for("aws_instance", &changes, Severity::Low),
            Severity::Low
        );
        assert_eq!(
            config.severity_for("aws_db_instance", &changes, Severity::Low),
            Severity::Critical
        );
    }
}
