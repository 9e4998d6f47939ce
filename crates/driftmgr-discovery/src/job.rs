use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request to run one or more registered provider adapters (spec §4.2).
/// An empty `providers` list means "every adapter in the registry."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryJob {
    pub id: Uuid,
    pub providers: Vec<String>,
    pub regions: Vec<String>,
}

impl DiscoveryJob {
    pub fn new(providers: Vec<String>, regions: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            providers,
            regions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A status snapshot for one job, returned by `GetScheduledJob`/
/// `GetScheduledJobs` (spec §4.2). Does not carry the discovered resources
/// themselves — those are the direct return value of `discover_resources`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job: DiscoveryJob,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Populated when one or more adapters failed outright; does not by
    /// itself imply `status == Failed` (partial failures are tolerated).
    pub error: Option<String>,
    pub resource_count: usize,
}
