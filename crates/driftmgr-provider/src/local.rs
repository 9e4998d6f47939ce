use std::path::PathBuf;

use async_trait::async_trait;
use driftmgr_core::Resource;
use tracing::{debug, warn};

use crate::driver::{DiscoveryContext, ProviderAdapter};
use crate::error::ProviderError;

/// A provider adapter that reads canonical [`Resource`] records from a JSON
/// fixture file on disk instead of a cloud API: no network calls, just a
/// local read. Useful for exercising the discovery engine and drift
/// detector in tests/CI without real provider credentials.
pub struct LocalAdapter {
    fixture_path: PathBuf,
}

impl LocalAdapter {
    pub fn new(fixture_path: impl Into<PathBuf>) -> Self {
        Self {
            fixture_path: fixture_path.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for LocalAdapter {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn discover_all(
        &self,
        ctx: &DiscoveryContext,
        _regions: &[String],
    ) -> Result<Vec<Resource>, ProviderError> {
        debug!(path = %self.fixture_path.display(), "local: reading fixture resources");

        let content = match tokio::fs::read_to_string(&self.fixture_path).await {
            Ok(c) => c,
            Err(e) => {
                // Per spec §4.1 this is a per-family listing failure, not a
                // missing-credentials failure: log, skip, return empty.
                warn!(path = %self.fixture_path.display(), error = %e, "local: fixture unreadable, skipping");
                return Ok(Vec::new());
            }
        };

        let raw: Vec<Resource> = match serde_json::from_str(&content) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %self.fixture_path.display(), error = %e, "local: fixture malformed, skipping");
                return Ok(Vec::new());
            }
        };

        let resources: Vec<Resource> = raw.into_iter().filter(Resource::has_required_fields).collect();
        ctx.report_progress("local", "fixture", resources.len());
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn missing_fixture_returns_empty_not_error() {
        let adapter = LocalAdapter::new("/nonexistent/path.json");
        let (tx, _rx) = mpsc::channel(100);
        let ctx = DiscoveryContext::new(tx);
        let resources = adapter.discover_all(&ctx, &[]).await.unwrap();
        assert!(resources.is_empty());
    }

    #[tokio::test]
    async fn reads_and_filters_fixture() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("driftmgr-local-test-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &path,
            r#"[
                {"id": "r-1", "name": "web", "type": "local_service", "provider": "local", "region": "global", "state": "active", "tags": {}, "properties": {}, "created_at": "1970-01-01T00:00:00Z", "attributes": {}, "metadata": {}},
                {"id": "", "name": "missing-id", "type": "local_service", "provider": "local", "region": "global", "state": "active", "tags": {}, "properties": {}, "created_at": "1970-01-01T00:00:00Z", "attributes": {}, "metadata": {}}
            ]"#,
        )
        .await
        .unwrap();

        let adapter = LocalAdapter::new(&path);
        let (tx, _rx) = mpsc::channel(100);
        let ctx = DiscoveryContext::new(tx);
        let resources = adapter.discover_all(&ctx, &[]).await.unwrap();
        tokio::fs::remove_file(&path).await.ok();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "r-1");
    }
}
