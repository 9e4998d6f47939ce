use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::record::DriftRecord;
use crate::repository::Repository;

/// A write-heavy, read-light in-memory [`Repository`] guarded by a single
/// `RwLock` (spec §5 "read-heavy uses RW locks, write-heavy uses plain
/// mutexes") — drift history here is append-mostly, so one lock around the
/// whole vector is adequate; no read-side fan-out needs to be unblocked.
#[derive(Default)]
pub struct InMemoryRepository {
    records: RwLock<Vec<DriftRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_drifts_by_provider_and_region(
        &self,
        provider: &str,
        region: &str,
    ) -> Result<Vec<DriftRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.result.provider == provider && r.result.region == region)
            .cloned()
            .collect())
    }

    async fn get_all_drifts(&self) -> Result<Vec<DriftRecord>, StoreError> {
        Ok(self.records.read().await.clone())
    }

    async fn record(&self, record: DriftRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftmgr_core::{DriftResult, DriftType, Severity};
    use uuid::Uuid;

    fn record(provider: &str, region: &str) -> DriftRecord {
        DriftRecord::new(
            DriftResult {
                resource_id: "i-1".into(),
                resource_name: "web".into(),
                resource_type: "aws_instance".into(),
                provider: provider.into(),
                region: region.into(),
                drift_type: DriftType::Missing,
                severity: Severity::High,
                description: String::new(),
                risk_reasoning: String::new(),
                changes: vec![],
                detected_at: driftmgr_core::resource::epoch(),
            },
            Uuid::new_v4(),
        )
    }

    #[tokio::test]
    async fn filters_by_provider_and_region() {
        let repo = InMemoryRepository::new();
        repo.record(record("aws", "us-east-1")).await.unwrap();
        repo.record(record("aws", "us-west-2")).await.unwrap();
        repo.record(record("azure", "us-east-1")).await.unwrap();

        let found = repo
            .get_drifts_by_provider_and_region("aws", "us-east-1")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].result.provider, "aws");
    }

    #[tokio::test]
    async fn get_all_returns_everything() {
        let repo = InMemoryRepository::new();
        repo.record(record("aws", "us-east-1")).await.unwrap();
        repo.record(record("azure", "us-east-1")).await.unwrap();
        assert_eq!(repo.get_all_drifts().await.unwrap().len(), 2);
    }
}
