use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::epoch;

/// One field-level difference discovered by the deep-diff engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftChange {
    /// Dotted path, e.g. `tags.environment`, `ingress[0].from_port`.
    pub field: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub change_type: ChangeType,
    pub description: Option<String>,
}

impl DriftChange {
    pub fn new(field: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            field: field.into(),
            old_value: None,
            new_value: None,
            change_type,
            description: None,
        }
    }

    pub fn with_values(mut self, old: Option<Value>, new: Option<Value>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Modified,
    Missing,
    Extra,
    Added,
    Removed,
    ItemAdded,
    ItemRemoved,
    TypeChanged,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    Missing,
    Extra,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Fallback severity from change count alone (spec §4.4): 0→low,
    /// 1→medium, 2-3→high, 4+→critical. Only consulted when no severity rule
    /// matches.
    pub fn from_change_count(count: usize) -> Self {
        match count {
            0 => Severity::Low,
            1 => Severity::Medium,
            2 | 3 => Severity::High,
            _ => Severity::Critical,
        }
    }

    /// Per-resource "impact" derived from severity (spec §4.5).
    pub fn impact(&self) -> &'static str {
        match self {
            Severity::Critical => "high",
            Severity::High => "medium",
            Severity::Medium => "low",
            Severity::Low => "minimal",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Per-resource drift outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    pub resource_id: String,
    pub resource_name: String,
    pub resource_type: String,
    pub provider: String,
    pub region: String,
    pub drift_type: DriftType,
    pub severity: Severity,
    pub description: String,
    /// Semicolon-separated clauses explaining the severity/risk assignment.
    pub risk_reasoning: String,
    /// Empty for `missing`/`extra` drift types.
    pub changes: Vec<DriftChange>,
    #[serde(default = "epoch")]
    pub detected_at: DateTime<Utc>,
}

/// Aggregate statistics over a set of [`DriftResult`]s (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_state_resources: usize,
    pub total_live_resources: usize,
    pub missing: usize,
    pub extra: usize,
    pub modified: usize,
    pub by_severity: HashMap<String, usize>,
    pub by_provider: HashMap<String, usize>,
    pub by_type: HashMap<String, usize>,
    /// `(state - missing) / state * 100`. Reported as 0 when `state == 0`.
    pub coverage_percentage: f64,
    /// `drifts / live * 100`. Reported as 0 when `live == 0`.
    pub drift_percentage: f64,
    /// `(state + extra - drifts) / (state + extra) * 100`.
    pub perspective_percentage: f64,
}

impl AnalysisSummary {
    /// Build a summary from a fully-computed list of drift results plus the
    /// sizes of the two input sets. `drifts_found = missing + extra +
    /// modified` is an invariant checked by the caller (spec §8).
    pub fn from_results(results: &[DriftResult], state_total: usize, live_total: usize) -> Self {
        let mut summary = AnalysisSummary {
            total_state_resources: state_total,
            total_live_resources: live_total,
            ..Default::default()
        };

        for r in results {
            match r.drift_type {
                DriftType::Missing => summary.missing += 1,
                DriftType::Extra => summary.extra += 1,
                DriftType::Modified => summary.modified += 1,
            }
            *summary.by_severity.entry(r.severity.to_string()).or_insert(0) += 1;
            *summary.by_provider.entry(r.provider.clone()).or_insert(0) += 1;
            *summary.by_type.entry(r.resource_type.clone()).or_insert(0) += 1;
        }

        let drifts_found = summary.missing + summary.extra + summary.modified;

        summary.coverage_percentage = if state_total == 0 {
            0.0
        } else {
            (state_total as f64 - summary.missing as f64) / state_total as f64 * 100.0
        };

        summary.drift_percentage = if live_total == 0 {
            0.0
        } else {
            drifts_found as f64 / live_total as f64 * 100.0
        };

        let denom = state_total + summary.extra;
        summary.perspective_percentage = if denom == 0 {
            0.0
        } else {
            (denom as f64 - drifts_found as f64) / denom as f64 * 100.0
        };

        summary
    }
}
