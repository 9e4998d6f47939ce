use chrono::{DateTime, Utc};
use driftmgr_core::{DriftResult, Severity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An audit-style event emitted over the course of one detection run, for
/// callers that want a timeline rather than just the final result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DriftEvent {
    DetectionStarted {
        run_id: Uuid,
        state_count: usize,
        live_count: usize,
        at: DateTime<Utc>,
    },
    ResourceDrifted {
        run_id: Uuid,
        resource_id: String,
        severity: Severity,
        at: DateTime<Utc>,
    },
    DetectionCompleted {
        run_id: Uuid,
        drifts_found: usize,
        at: DateTime<Utc>,
    },
}

/// Builds the [`DriftEvent`] sequence for one completed detection run. The
/// caller decides whether to persist these (e.g. via a `Repository`); this
/// crate only shapes the events.
pub fn events_for_run(run_id: Uuid, state_count: usize, live_count: usize, results: &[DriftResult]) -> Vec<DriftEvent> {
    let mut events = vec![DriftEvent::DetectionStarted {
        run_id,
        state_count,
        live_count,
        at: Utc::now(),
    }];

    for result in results {
        events.push(DriftEvent::ResourceDrifted {
            run_id,
            resource_id: result.resource_id.clone(),
            severity: result.severity,
            at: result.detected_at,
        });
    }

    events.push(DriftEvent::DetectionCompleted {
        run_id,
        drifts_found: results.len(),
        at: Utc::now(),
    });

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftmgr_core::DriftType;

    fn result(resource_id: &str) -> DriftResult {
        DriftResult {
            resource_id: resource_id.to_string(),
            resource_name: "web".into(),
            resource_type: "aws_instance".into(),
            provider: "aws".into(),
            region: "us-east-1".into(),
            drift_type: DriftType::Missing,
            severity: Severity::High,
            description: String::new(),
            risk_reasoning: String::new(),
            changes: Vec::new(),
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn event_sequence_brackets_one_event_per_result() {
        let run_id = Uuid::new_v4();
        let results = vec![result("i-1"), result("i-2")];
        let events = events_for_run(run_id, 5, 5, &results);
        assert_eq!(events.len(), 4); // started + 2 drifted + completed
        assert!(matches!(events.first(), Some(DriftEvent::DetectionStarted { .. })));
        assert!(matches!(events.last(), Some(DriftEvent::DetectionCompleted { drifts_found: 2, .. })));
    }
}
