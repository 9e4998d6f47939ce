use serde::{Deserialize, Serialize};

/// Snapshot of counters across every job the engine has ever scheduled
/// (spec §4.2 `GetDiscoveryStatistics`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryStatistics {
    pub jobs_total: usize,
    pub jobs_pending: usize,
    pub jobs_running: usize,
    pub jobs_completed: usize,
    pub jobs_failed: usize,
    pub jobs_cancelled: usize,
    pub resources_discovered_total: usize,
}
