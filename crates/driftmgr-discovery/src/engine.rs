use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use driftmgr_core::Resource;
use driftmgr_provider::{DiscoveryContext, ProgressUpdate, ProviderAdapter, Registry};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DiscoveryError;
use crate::job::{DiscoveryJob, JobStatus, ScheduledJob};
use crate::stats::DiscoveryStatistics;

struct JobEntry {
    scheduled: ScheduledJob,
    ctx: DiscoveryContext,
}

/// Orchestrates one or more [`ProviderAdapter`]s for a discovery job: fans
/// out to every registered adapter and merges their canonical [`Resource`]
/// outputs.
pub struct DiscoveryEngine {
    registry: Arc<Registry>,
    jobs: RwLock<HashMap<Uuid, JobEntry>>,
}

impl DiscoveryEngine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// `DiscoverResources(context, job) -> results` (spec §4.2). Registers
    /// the job, walks it through `pending -> running -> {completed, failed,
    /// cancelled}`, and returns the merged resource list.
    pub async fn discover_resources(&self, job: DiscoveryJob) -> Vec<Resource> {
        let (tx, mut rx) = mpsc::channel::<ProgressUpdate>(100);
        let ctx = DiscoveryContext::new(tx);

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(
                job.id,
                JobEntry {
                    scheduled: ScheduledJob {
                        job: job.clone(),
                        status: JobStatus::Pending,
                        started_at: None,
                        finished_at: None,
                        error: None,
                        resource_count: 0,
                    },
                    ctx: ctx.clone(),
                },
            );
        }

        // Multiplexes per-adapter progress into a single stream (spec
        // §4.2). A real UI consumer would subscribe to `rx` directly
        // instead of draining it here; this just keeps the channel open
        // and logs so adapters never block on a full buffer.
        let progress_task = tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                debug!(service = %update.service, family = %update.resource_family, count = update.count, "discovery progress");
            }
        });

        {
            let mut jobs = self.jobs.write().await;
            if let Some(entry) = jobs.get_mut(&job.id) {
                entry.scheduled.status = JobStatus::Running;
                entry.scheduled.started_at = Some(Utc::now());
            }
        }

        let adapters: Vec<Arc<dyn ProviderAdapter>> = if job.providers.is_empty() {
            self.registry.all()
        } else {
            job.providers.iter().filter_map(|name| self.registry.get(name)).collect()
        };

        let mut workers = JoinSet::new();
        for adapter in adapters {
            let ctx = ctx.clone();
            let regions = job.regions.clone();
            workers.spawn(async move {
                let name = adapter.name().to_string();
                match adapter.discover_all(&ctx, &regions).await {
                    Ok(found) => Ok(found),
                    Err(e) => {
                        warn!(provider = %name, error = %e, "discovery: adapter failed, continuing with partial results");
                        Err(format!("{}: {}", name, e))
                    }
                }
            });
        }

        let mut resources = Vec::new();
        let mut errors = Vec::new();
        let mut any_success = false;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(found)) => {
                    any_success = true;
                    resources.extend(found);
                }
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(format!("adapter task panicked: {}", e)),
            }
        }

        progress_task.abort();

        let cancelled = ctx.is_cancelled();
        let status = if cancelled {
            JobStatus::Cancelled
        } else if !any_success && !errors.is_empty() {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };

        {
            let mut jobs = self.jobs.write().await;
            if let Some(entry) = jobs.get_mut(&job.id) {
                entry.scheduled.status = status;
                entry.scheduled.finished_at = Some(Utc::now());
                entry.scheduled.resource_count = resources.len();
                if !errors.is_empty() {
                    entry.scheduled.error = Some(errors.join("; "));
                }
            }
        }

        info!(job_id = %job.id, count = resources.len(), status = ?status, "discovery job finished");
        resources
    }

    pub async fn get_scheduled_jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.read().await.values().map(|e| e.scheduled.clone()).collect()
    }

    pub async fn get_scheduled_job(&self, id: Uuid) -> Option<ScheduledJob> {
        self.jobs.read().await.get(&id).map(|e| e.scheduled.clone())
    }

    pub async fn cancel_scheduled_discovery(&self, id: Uuid) -> Result<(), DiscoveryError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&id).ok_or(DiscoveryError::JobNotFound(id))?;
        entry.ctx.cancel();
        Ok(())
    }

    pub async fn get_discovery_statistics(&self) -> DiscoveryStatistics {
        let jobs = self.jobs.read().await;
        let mut stats = DiscoveryStatistics::default();
        for entry in jobs.values() {
            stats.jobs_total += 1;
            match entry.scheduled.status {
                JobStatus::Pending => stats.jobs_pending += 1,
                JobStatus::Running => stats.jobs_running += 1,
                JobStatus::Completed => stats.jobs_completed += 1,
                JobStatus::Failed => stats.jobs_failed += 1,
                JobStatus::Cancelled => stats.jobs_cancelled += 1,
            }
            stats.resources_discovered_total += entry.scheduled.resource_count;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use driftmgr_provider::ProviderError;

    struct Dummy {
        name: &'static str,
        resources: Vec<Resource>,
    }

    #[async_trait]
    impl ProviderAdapter for Dummy {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn discover_all(&self, ctx: &DiscoveryContext, _regions: &[String]) -> Result<Vec<Resource>, ProviderError> {
            ctx.report_progress(self.name, "things", self.resources.len());
            Ok(self.resources.clone())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl ProviderAdapter for AlwaysFails {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn discover_all(&self, _ctx: &DiscoveryContext, _regions: &[String]) -> Result<Vec<Resource>, ProviderError> {
            Err(ProviderError::CredentialsUnavailable {
                provider: "broken".into(),
                reason: "no token".into(),
            })
        }
    }

    #[tokio::test]
    async fn discover_resources_merges_all_adapters() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Dummy {
            name: "aws",
            resources: vec![Resource::new("i-1", "web", "aws_instance", "aws")],
        }));
        registry.register(Arc::new(Dummy {
            name: "gcp",
            resources: vec![Resource::new("vm-1", "api", "gcp_compute_instance", "gcp")],
        }));

        let engine = DiscoveryEngine::new(Arc::new(registry));
        let job = DiscoveryJob::new(vec![], vec!["us-east-1".into()]);
        let resources = engine.discover_resources(job.clone()).await;

        assert_eq!(resources.len(), 2);
        let status = engine.get_scheduled_job(job.id).await.unwrap();
        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(status.resource_count, 2);
    }

    #[tokio::test]
    async fn job_fails_when_every_adapter_errors() {
        let mut registry = Registry::new();
        registry.register(Arc::new(AlwaysFails));

        let engine = DiscoveryEngine::new(Arc::new(registry));
        let job = DiscoveryJob::new(vec![], vec![]);
        let resources = engine.discover_resources(job.clone()).await;

        assert!(resources.is_empty());
        let status = engine.get_scheduled_job(job.id).await.unwrap();
        assert_eq!(status.status, JobStatus::Failed);
        assert!(status.error.is_some());
    }

    #[tokio::test]
    async fn partial_failure_still_completes_with_other_adapters_results() {
        let mut registry = Registry::new();
        registry.register(Arc::new(AlwaysFails));
        registry.register(Arc::new(Dummy {
            name: "aws",
            resources: vec![Resource::new("i-1", "web", "aws_instance", "aws")],
        }));

        let engine = DiscoveryEngine::new(Arc::new(registry));
        let job = DiscoveryJob::new(vec![], vec![]);
        let resources = engine.discover_resources(job.clone()).await;

        assert_eq!(resources.len(), 1);
        let status = engine.get_scheduled_job(job.id).await.unwrap();
        assert_eq!(status.status, JobStatus::Completed);
        assert!(status.error.is_some());
    }

    #[tokio::test]
    async fn cancel_scheduled_discovery_marks_cancelled_on_next_poll() {
        let registry = Registry::new();
        let engine = DiscoveryEngine::new(Arc::new(registry));
        let job = DiscoveryJob::new(vec![], vec![]);

        // No adapters registered, so discover_resources returns instantly;
        // exercise cancel + stats bookkeeping directly instead.
        {
            let mut jobs = engine.jobs.write().await;
            jobs.insert(
                job.id,
                JobEntry {
                    scheduled: ScheduledJob {
                        job: job.clone(),
                        status: JobStatus::Running,
                        started_at: Some(Utc::now()),
                        finished_at: None,
                        error: None,
                        resource_count: 0,
                    },
                    ctx: DiscoveryContext::new(mpsc::channel(1).0),
                },
            );
        }

        engine.cancel_scheduled_discovery(job.id).await.unwrap();
        let entry = engine.jobs.read().await;
        assert!(entry.get(&job.id).unwrap().ctx.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_unknown_job_returns_not_found() {
        let engine = DiscoveryEngine::new(Arc::new(Registry::new()));
        let err = engine.cancel_scheduled_discovery(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::JobNotFound(_)));
    }
}
