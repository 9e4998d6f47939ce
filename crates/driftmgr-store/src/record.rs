use chrono::{DateTime, Utc};
use driftmgr_core::DriftResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A [`DriftResult`] as persisted by a repository, with the bookkeeping
/// fields the core itself never needs (spec §3/§6: "Repository ...
/// `GetDriftsByProviderAndRegion(ctx, provider, region) -> []DriftRecord`").
///
/// The core produces [`DriftResult`]s and hands them to a repository; it
/// never reads a `DriftRecord` back except through [`crate::Repository`]
/// queries made by the summariser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftRecord {
    pub id: Uuid,
    pub result: DriftResult,
    /// The discovery run this record was produced by, for trend bucketing.
    pub run_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl DriftRecord {
    pub fn new(result: DriftResult, run_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: result.detected_at,
            result,
            run_id,
        }
    }
}
