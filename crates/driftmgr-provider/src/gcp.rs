use std::sync::Arc;

use async_trait::async_trait;
use driftmgr_core::Resource;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::driver::{DiscoveryContext, ProviderAdapter};
use crate::error::ProviderError;

const PROVIDER: &str = "gcp";

async fn adc_token() -> Result<String, ProviderError> {
    let provider = gcp_auth::provider().await.map_err(|e| ProviderError::CredentialsUnavailable {
        provider: PROVIDER.into(),
        reason: format!("application default credentials unavailable: {}", e),
    })?;
    let token = provider
        .token(&["https://www.googleapis.com/auth/cloud-platform"])
        .await
        .map_err(|e| ProviderError::CredentialsUnavailable {
            provider: PROVIDER.into(),
            reason: format!("failed to mint access token: {}", e),
        })?;
    Ok(token.as_str().to_string())
}

fn project_id_from_env() -> Result<String, ProviderError> {
    std::env::var("GOOGLE_PROJECT")
        .or_else(|_| std::env::var("GCP_PROJECT"))
        .or_else(|_| std::env::var("GOOGLE_CLOUD_PROJECT"))
        .map_err(|_| ProviderError::CredentialsUnavailable {
            provider: PROVIDER.into(),
            reason: "GOOGLE_PROJECT / GCP_PROJECT / GOOGLE_CLOUD_PROJECT not set".into(),
        })
}

/// Drain a GCP `nextPageToken`-paginated listing, tolerating per-page
/// failures (spec §4.1).
async fn list_paginated(client: &reqwest::Client, token: &str, base_url: &str, items_key: &str, family: &str) -> Vec<Value> {
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut url = base_url.to_string();
        if let Some(pt) = &page_token {
            let sep = if url.contains('?') { '&' } else { '?' };
            url.push(sep);
            url.push_str("pageToken=");
            url.push_str(pt);
        }

        let resp = match client.get(&url).bearer_auth(token).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(family, error = %e, "gcp: page request failed, returning partial results");
                break;
            }
        };
        if !resp.status().is_success() {
            warn!(family, status = %resp.status(), "gcp: page returned error status, returning partial results");
            break;
        }
        let body: Value = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(family, error = %e, "gcp: page body undecodable, returning partial results");
                break;
            }
        };
        if let Some(values) = body.get(items_key).and_then(|v| v.as_array()) {
            items.extend(values.iter().cloned());
        }
        page_token = body.get("nextPageToken").and_then(|v| v.as_str()).map(String::from);
        if page_token.is_none() {
            break;
        }
    }
    items
}

fn to_resource(native: &Value, resource_type: &str, region: &str) -> Option<Resource> {
    let id = native
        .get("id")
        .and_then(|v| v.as_str().map(String::from).or_else(|| v.as_u64().map(|n| n.to_string())))
        .or_else(|| native.get("name").and_then(|v| v.as_str()).map(String::from))?;
    let name = native.get("name").and_then(|v| v.as_str())?.to_string();
    if id.is_empty() || name.is_empty() {
        return None;
    }

    let mut resource = Resource::new(id, name, resource_type, PROVIDER).with_region(region);
    resource.state = native
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("active")
        .to_lowercase();

    if let Some(labels) = native.get("labels").and_then(|v| v.as_object()) {
        resource.tags = labels
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();
    }
    if let Some(obj) = native.as_object() {
        resource.properties = obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    }
    Some(resource)
}

pub struct GcpAdapter {
    client: reqwest::Client,
}

impl GcpAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn discover_compute_instances(&self, token: &str, project: &str, zone: &str) -> Vec<Resource> {
        let url = format!(
            "https://compute.googleapis.com/compute/v1/projects/{}/zones/{}/instances",
            project, zone
        );
        list_paginated(&self.client, token, &url, "items", "compute_instances")
            .await
            .iter()
            .filter_map(|n| to_resource(n, "gcp_compute_instance", zone))
            .collect()
    }

    async fn discover_networks(&self, token: &str, project: &str) -> Vec<Resource> {
        let url = format!("https://compute.googleapis.com/compute/v1/projects/{}/global/networks", project);
        list_paginated(&self.client, token, &url, "items", "networks")
            .await
            .iter()
            .filter_map(|n| to_resource(n, "gcp_network", "global"))
            .collect()
    }

    async fn discover_storage_buckets(&self, token: &str, project: &str) -> Vec<Resource> {
        let url = format!(
            "https://storage.googleapis.com/storage/v1/b?project={}",
            project
        );
        list_paginated(&self.client, token, &url, "items", "storage_buckets")
            .await
            .iter()
            .filter_map(|n| {
                let region = n.get("location").and_then(|v| v.as_str()).unwrap_or("global");
                to_resource(n, "gcp_storage_bucket", region)
            })
            .collect()
    }
}

impl Default for GcpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for GcpAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn discover_all(&self, ctx: &DiscoveryContext, regions: &[String]) -> Result<Vec<Resource>, ProviderError> {
        let project = project_id_from_env()?;
        let token = adc_token().await?;
        debug!(project, "gcp: starting discovery fan-out");

        let results = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut workers = JoinSet::new();

        for zone in regions {
            if ctx.is_cancelled() {
                break;
            }
            let adapter = GcpAdapter {
                client: self.client.clone(),
            };
            let token = token.clone();
            let project = project.clone();
            let zone = zone.clone();
            let ctx = ctx.clone();
            let results = Arc::clone(&results);
            workers.spawn(async move {
                let found = adapter.discover_compute_instances(&token, &project, &zone).await;
                ctx.report_progress(PROVIDER, "compute_instances", found.len());
                results.lock().await.extend(found);
            });
        }

        {
            let adapter = GcpAdapter {
                client: self.client.clone(),
            };
            let token = token.clone();
            let project = project.clone();
            let ctx = ctx.clone();
            let results = Arc::clone(&results);
            workers.spawn(async move {
                let found = adapter.discover_networks(&token, &project).await;
                ctx.report_progress(PROVIDER, "networks", found.len());
                results.lock().await.extend(found);
            });
        }
        {
            let adapter = GcpAdapter {
                client: self.client.clone(),
            };
            let ctx = ctx.clone();
            let results = Arc::clone(&results);
            workers.spawn(async move {
                let found = adapter.discover_storage_buckets(&token, &project).await;
                ctx.report_progress(PROVIDER, "storage_buckets", found.len());
                results.lock().await.extend(found);
            });
        }

        while workers.join_next().await.is_some() {}

        let resources = Arc::try_unwrap(results).map(|m| m.into_inner()).unwrap_or_default();
        Ok(resources)
    }
}
