use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::DriftRecord;

/// The persistence surface the core's drift summariser depends on
/// (spec §6). The core never implements a durable backend itself — that is
/// an external collaborator's job — but it needs *some* view of history to
/// compute trends, so this trait is the seam.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Every drift record recorded for `(provider, region)`, most-recent
    /// first is not guaranteed — callers sort as needed.
    async fn get_drifts_by_provider_and_region(
        &self,
        provider: &str,
        region: &str,
    ) -> Result<Vec<DriftRecord>, StoreError>;

    /// Every drift record recorded across all providers/regions. Used by
    /// aggregate (non-per-region) summaries.
    async fn get_all_drifts(&self) -> Result<Vec<DriftRecord>, StoreError>;

    /// Append one record. Collaborator-owned in a real deployment; the
    /// in-memory implementation here exists for tests and for the CLI's
    /// default standalone mode.
    async fn record(&self, record: DriftRecord) -> Result<(), StoreError>;
}
