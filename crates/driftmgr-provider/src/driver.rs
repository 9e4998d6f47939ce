use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use driftmgr_core::Resource;
use tokio::sync::mpsc;

use crate::error::ProviderError;

/// One progress record emitted by a resource-family worker (spec §4.1:
/// "emits a progress record (service, resource family, count) on a bounded
/// progress channel"). Advisory only — nothing downstream depends on every
/// update arriving.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub service: String,
    pub resource_family: String,
    pub count: usize,
}

/// The cooperative-cancellation + progress-reporting context carried down
/// every adapter call chain (spec §5: "Parallel workers with cooperative
/// cancellation via a context object carried down every call chain").
///
/// Cloning is cheap and shares both the cancellation flag and the progress
/// sender, so every family worker spawned from [`ProviderAdapter::discover_all`]
/// should hold its own clone.
#[derive(Clone)]
pub struct DiscoveryContext {
    cancelled: Arc<AtomicBool>,
    progress: mpsc::Sender<ProgressUpdate>,
}

impl DiscoveryContext {
    /// `progress` should be a bounded channel (capacity ~100 per spec §5); a
    /// slow reporter must never block workers, so [`Self::report_progress`]
    /// uses `try_send` and silently drops on a full buffer.
    pub fn new(progress: mpsc::Sender<ProgressUpdate>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            progress,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Progress is advisory (spec §5/§9): never back-pressure workers.
    pub fn report_progress(&self, service: impl Into<String>, resource_family: impl Into<String>, count: usize) {
        let _ = self.progress.try_send(ProgressUpdate {
            service: service.into(),
            resource_family: resource_family.into(),
            count,
        });
    }
}

/// One per-provider enumerator (spec §4.1). Each worker inside
/// `discover_all` drains a paginated listing, maps native objects into
/// canonical [`Resource`]s, and reports progress; per-family failures are
/// logged and swallowed so one API hiccup never poisons the whole run.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn discover_all(
        &self,
        ctx: &DiscoveryContext,
        regions: &[String],
    ) -> Result<Vec<Resource>, ProviderError>;
}
