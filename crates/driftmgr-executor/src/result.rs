use chrono::{DateTime, Utc};
use driftmgr_core::ModuleStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource-count summary scraped from `plan`/`apply` output (spec §4.8
/// step 3e: "N to add, M to change, P to destroy").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub to_add: usize,
    pub to_change: usize,
    pub to_destroy: usize,
}

/// Scan combined plan/apply output for the last `Plan: N to add, M to
/// change, P to destroy` line terraform/terragrunt prints. Returns `None`
/// if no such line is present (e.g. `destroy`-only runs, or a command
/// other than `plan`/`apply`). A plain line scan rather than a regex —
/// terraform's plan line has one fixed shape.
pub fn parse_plan_summary(output: &str) -> Option<PlanSummary> {
    output.lines().rev().find_map(parse_plan_line)
}

fn parse_plan_line(line: &str) -> Option<PlanSummary> {
    let rest = line.trim().strip_prefix("Plan:")?;
    let mut numbers = rest.split_whitespace().filter_map(|tok| tok.parse::<usize>().ok());
    Some(PlanSummary {
        to_add: numbers.next()?,
        to_change: numbers.next()?,
        to_destroy: numbers.next()?,
    })
}

/// Outcome of running one module through the configured command (spec §3
/// "Terragrunt Module.status", §6 execution outputs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleExecResult {
    pub module_path: String,
    pub status: ModuleStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub plan_summary: Option<PlanSummary>,
    pub attempts: u32,
    pub error: Option<String>,
}

impl ModuleExecResult {
    pub fn pending(module_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            status: ModuleStatus::Pending,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            started_at: None,
            finished_at: None,
            plan_summary: None,
            attempts: 0,
            error: None,
        }
    }

    pub fn skipped(module_path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            status: ModuleStatus::Skipped,
            ..Self::pending(module_path)
        }
    }
}

/// Point-in-time counters (spec §4.8 "Progress: ... snapshot returning
/// {total, completed, success, failed, skipped, running, duration}").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub running: usize,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plan_summary_line() {
        let output = "Refreshing state...\n\nPlan: 3 to add, 1 to change, 0 to destroy.\n";
        let summary = parse_plan_summary(output).unwrap();
        assert_eq!(summary, PlanSummary { to_add: 3, to_change: 1, to_destroy: 0 });
    }

    #[test]
    fn takes_the_last_plan_line_when_several_modules_logged_to_one_buffer() {
        let output = "Plan: 1 to add, 0 to change, 0 to destroy.\nPlan: 5 to add, 2 to change, 1 to destroy.\n";
        let summary = parse_plan_summary(output).unwrap();
        assert_eq!(summary, PlanSummary { to_add: 5, to_change: 2, to_destroy: 1 });
    }

    #[test]
    fn no_plan_line_yields_none() {
        assert!(parse_plan_summary("Destroy complete! Resources: 2 destroyed.").is_none());
    }
}
