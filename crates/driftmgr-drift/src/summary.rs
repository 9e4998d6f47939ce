use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use driftmgr_core::{AnalysisSummary, DriftResult};
use driftmgr_store::DriftRecord;
use serde::{Deserialize, Serialize};

/// One day's point in a drift trend (spec §4.5). `total`/`drift_percentage`
/// reflect only what the repository can report — counts of persisted drift
/// records — since the `Repository` interface (spec §6) has no notion of
/// "total resources scanned that day," only drifted ones. Days with no
/// records in range are zero-filled rather than interpolated (spec §9 Open
/// Question: never fabricate deltas).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub total: usize,
    pub drifted: usize,
    pub drift_percentage: f64,
    pub new: usize,
    pub resolved: usize,
}

/// A resource ranked by how often it has drifted (spec §4.5 "Top-N drifted
/// resources ranked by drift count, ties broken by most-recent detection").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopDriftedResource {
    pub resource_id: String,
    pub resource_name: String,
    pub drift_count: usize,
    pub most_recent_detection: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftSummary {
    pub analysis: AnalysisSummary,
    pub compliance_rate: f64,
    pub top_drifted: Vec<TopDriftedResource>,
    pub trend: Vec<TrendPoint>,
    pub impact_by_resource: HashMap<String, &'static str>,
}

/// Builds one [`DriftSummary`] from a single detection run's results
/// (totals/histograms/compliance rate) plus whatever history the repository
/// returns (top-N and trend). `top_n` bounds the ranked-resource list.
pub fn summarize(results: &[DriftResult], state_total: usize, live_total: usize, history: &[DriftRecord], top_n: usize) -> DriftSummary {
    let analysis = AnalysisSummary::from_results(results, state_total, live_total);
    let compliance_rate = 100.0 - analysis.drift_percentage;
    let top_drifted = top_drifted_resources(history, top_n);
    let trend = trend_from_records(history);
    let impact_by_resource = results.iter().map(|r| (r.resource_id.clone(), r.severity.impact())).collect();

    DriftSummary {
        analysis,
        compliance_rate,
        top_drifted,
        trend,
        impact_by_resource,
    }
}

pub fn top_drifted_resources(history: &[DriftRecord], top_n: usize) -> Vec<TopDriftedResource> {
    let mut counts: HashMap<String, (String, usize, DateTime<Utc>)> = HashMap::new();
    for record in history {
        let r = &record.result;
        let entry = counts
            .entry(r.resource_id.clone())
            .or_insert_with(|| (r.resource_name.clone(), 0, record.recorded_at));
        entry.1 += 1;
        if record.recorded_at >= entry.2 {
            entry.2 = record.recorded_at;
            entry.0 = r.resource_name.clone();
        }
    }

    let mut list: Vec<TopDriftedResource> = counts
        .into_iter()
        .map(|(resource_id, (resource_name, drift_count, most_recent_detection))| TopDriftedResource {
            resource_id,
            resource_name,
            drift_count,
            most_recent_detection,
        })
        .collect();

    list.sort_by(|a, b| {
        b.drift_count
            .cmp(&a.drift_count)
            .then(b.most_recent_detection.cmp(&a.most_recent_detection))
    });
    list.truncate(top_n);
    list
}

pub fn trend_from_records(history: &[DriftRecord]) -> Vec<TrendPoint> {
    if history.is_empty() {
        return Vec::new();
    }

    let mut by_day: BTreeMap<NaiveDate, HashSet<String>> = BTreeMap::new();
    for record in history {
        by_day
            .entry(record.recorded_at.date_naive())
            .or_default()
            .insert(record.result.resource_id.clone());
    }

    let min_date = *by_day.keys().next().expect("checked non-empty above");
    let max_date = *by_day.keys().last().expect("checked non-empty above");

    let mut trend = Vec::new();
    let mut previous: HashSet<String> = HashSet::new();
    let mut date = min_date;
    loop {
        let today = by_day.get(&date).cloned().unwrap_or_default();
        let new = today.difference(&previous).count();
        let resolved = previous.difference(&today).count();
        let drifted = today.len();
        trend.push(TrendPoint {
            date,
            total: drifted,
            drifted,
            drift_percentage: if drifted == 0 { 0.0 } else { 100.0 },
            new,
            resolved,
        });
        previous = today;
        if date == max_date {
            break;
        }
        date = date.succ_opt().expect("date stays within representable range");
    }
    trend
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use driftmgr_core::{DriftType, Severity};
    use uuid::Uuid;

    fn record(resource_id: &str, recorded_at: DateTime<Utc>) -> DriftRecord {
        let result = DriftResult {
            resource_id: resource_id.to_string(),
            resource_name: resource_id.to_string(),
            resource_type: "aws_instance".into(),
            provider: "aws".into(),
            region: "us-east-1".into(),
            drift_type: DriftType::Modified,
            severity: Severity::High,
            description: String::new(),
            risk_reasoning: String::new(),
            changes: Vec::new(),
            detected_at: recorded_at,
        };
        DriftRecord::new(result, Uuid::new_v4())
    }

    #[test]
    fn top_drifted_ranks_by_count_then_recency() {
        let t0 = Utc.timestamp_opt(0, 0).single().unwrap();
        let history = vec![record("a", t0), record("a", t0), record("b", t0)];
        let top = top_drifted_resources(&history, 10);
        assert_eq!(top[0].resource_id, "a");
        assert_eq!(top[0].drift_count, 2);
        assert_eq!(top[1].resource_id, "b");
    }

    #[test]
    fn top_drifted_truncates_to_n() {
        let t0 = Utc.timestamp_opt(0, 0).single().unwrap();
        let history = vec![record("a", t0), record("b", t0), record("c", t0)];
        let top = top_drifted_resources(&history, 2);
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn trend_zero_fills_gap_days() {
        let day0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap();
        let history = vec![record("a", day0), record("b", day2)];
        let trend = trend_from_records(&history);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[1].drifted, 0);
        assert_eq!(trend[1].new, 0);
        assert_eq!(trend[1].resolved, 1); // "a" was present day0, gone day1
    }

    #[test]
    fn trend_empty_history_yields_empty_trend() {
        assert!(trend_from_records(&[]).is_empty());
    }
}
