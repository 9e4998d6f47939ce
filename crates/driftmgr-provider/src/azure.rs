use std::collections::HashMap;

use async_trait::async_trait;
use driftmgr_core::{normalize_map_tags, Resource};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::driver::{DiscoveryContext, ProviderAdapter};
use crate::error::ProviderError;

const PROVIDER: &str = "azure";
const ARM_BASE: &str = "https://management.azure.com";
const API_VERSION_GENERIC: &str = "2021-04-01";

#[derive(Clone)]
struct AzureCredentials {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    subscription_id: String,
}

fn credentials_from_env() -> Result<AzureCredentials, ProviderError> {
    let missing = |var: &str| ProviderError::CredentialsUnavailable {
        provider: PROVIDER.into(),
        reason: format!("{} not set", var),
    };
    Ok(AzureCredentials {
        tenant_id: std::env::var("AZURE_TENANT_ID").map_err(|_| missing("AZURE_TENANT_ID"))?,
        client_id: std::env::var("AZURE_CLIENT_ID").map_err(|_| missing("AZURE_CLIENT_ID"))?,
        client_secret: std::env::var("AZURE_CLIENT_SECRET").map_err(|_| missing("AZURE_CLIENT_SECRET"))?,
        subscription_id: std::env::var("AZURE_SUBSCRIPTION_ID")
            .map_err(|_| missing("AZURE_SUBSCRIPTION_ID"))?,
    })
}

async fn fetch_token(client: &reqwest::Client, creds: &AzureCredentials) -> Result<String, ProviderError> {
    let url = format!(
        "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
        creds.tenant_id
    );
    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", creds.client_id.as_str()),
        ("client_secret", creds.client_secret.as_str()),
        ("scope", "https://management.azure.com/.default"),
    ];

    let resp = client
        .post(&url)
        .form(&params)
        .send()
        .await
        .map_err(|source| ProviderError::Http {
            provider: PROVIDER.into(),
            endpoint: "oauth2/v2.0/token".into(),
            source,
        })?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::ApiError {
            provider: PROVIDER.into(),
            endpoint: "oauth2/v2.0/token".into(),
            status,
            body,
        });
    }

    let body: Value = resp.json().await.map_err(|source| ProviderError::Http {
        provider: PROVIDER.into(),
        endpoint: "oauth2/v2.0/token".into(),
        source,
    })?;
    body.get("access_token")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::Internal("azure: token response missing access_token".into()))
}

/// Drain an ARM `nextLink`-paginated listing into native JSON objects
/// (spec §4.1: "obtains a paginated iterator ... drains pages until
/// exhausted"). A per-page HTTP failure logs and returns whatever was
/// already collected rather than failing the whole family.
async fn list_paginated(
    client: &reqwest::Client,
    token: &str,
    mut url: String,
    family: &str,
) -> Vec<Value> {
    let mut items = Vec::new();
    loop {
        let resp = match client.get(&url).bearer_auth(token).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(family, error = %e, "azure: page request failed, returning partial results");
                break;
            }
        };
        if !resp.status().is_success() {
            warn!(family, status = %resp.status(), "azure: page returned error status, returning partial results");
            break;
        }
        let body: Value = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(family, error = %e, "azure: page body undecodable, returning partial results");
                break;
            }
        };
        if let Some(values) = body.get("value").and_then(|v| v.as_array()) {
            items.extend(values.iter().cloned());
        }
        match body.get("nextLink").and_then(|v| v.as_str()) {
            Some(next) => url = next.to_string(),
            None => break,
        }
    }
    items
}

/// Flatten Azure's map-of-maybe-string tags on a native ARM object.
fn tags_of(native: &Value) -> HashMap<String, String> {
    let entries = native
        .get("tags")
        .and_then(|t| t.as_object())
        .map(|m| {
            m.iter()
                .map(|(k, v)| (k.clone(), v.as_str().map(String::from)))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    normalize_map_tags(entries)
}

fn to_resource(native: &Value, resource_type: &str, region_override: Option<&str>) -> Option<Resource> {
    let id = native.get("id").and_then(|v| v.as_str())?.to_string();
    let name = native.get("name").and_then(|v| v.as_str())?.to_string();
    if id.is_empty() || name.is_empty() {
        return None;
    }
    let region = region_override
        .map(String::from)
        .or_else(|| native.get("location").and_then(|v| v.as_str()).map(String::from))
        .unwrap_or_else(|| "global".to_string());

    let mut resource = Resource::new(id, name, resource_type, PROVIDER)
        .with_region(region)
        .with_tags(tags_of(native));

    if let Some(props) = native.get("properties").and_then(|v| v.as_object()) {
        resource.properties = props.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        resource.attributes = resource.properties.clone();
    }
    Some(resource)
}

pub struct AzureAdapter {
    client: reqwest::Client,
}

impl AzureAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn discover_family(
        &self,
        token: &str,
        creds: &AzureCredentials,
        provider_path: &str,
        api_version: &str,
        resource_type: &str,
        family: &str,
    ) -> Vec<Resource> {
        let url = format!(
            "{}/subscriptions/{}/providers/{}?api-version={}",
            ARM_BASE, creds.subscription_id, provider_path, api_version
        );
        let natives = list_paginated(&self.client, token, url, family).await;
        natives
            .iter()
            .filter_map(|n| to_resource(n, resource_type, None))
            .collect()
    }
}

impl Default for AzureAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for AzureAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn discover_all(&self, ctx: &DiscoveryContext, _regions: &[String]) -> Result<Vec<Resource>, ProviderError> {
        let creds = credentials_from_env()?;
        let token = fetch_token(&self.client, &creds).await?;
        debug!(subscription = %creds.subscription_id, "azure: starting discovery fan-out");

        // (provider_path, api_version, resource_type, family) — one worker
        // per logical resource family (spec §4.1).
        let mut families: Vec<(&str, &str, &str, &str)> = vec![
            (
                "Microsoft.Storage/storageAccounts",
                "2023-01-01",
                "azure_storage_account",
                "storage_accounts",
            ),
            (
                "Microsoft.Compute/virtualMachines",
                "2023-09-01",
                "azure_virtual_machine",
                "virtual_machines",
            ),
            (
                "Microsoft.Network/virtualNetworks",
                "2023-09-01",
                "azure_virtual_network",
                "virtual_networks",
            ),
            (
                "Microsoft.Network/loadBalancers",
                "2023-09-01",
                "azure_load_balancer",
                "load_balancers",
            ),
            (
                "Microsoft.Compute/disks",
                "2023-10-02",
                "azure_disk",
                "disks",
            ),
        ];

        #[cfg(feature = "azure-extended")]
        {
            families.push(("Microsoft.KeyVault/vaults", "2023-07-01", "azure_key_vault", "key_vaults"));
            families.push((
                "Microsoft.ContainerRegistry/registries",
                "2023-07-01",
                "azure_container_registry",
                "container_registries",
            ));
        }

        let mut workers = JoinSet::new();
        for (provider_path, api_version, resource_type, family) in families {
            if ctx.is_cancelled() {
                break;
            }
            let adapter = AzureAdapter {
                client: self.client.clone(),
            };
            let token = token.clone();
            let creds = creds.clone();
            let ctx = ctx.clone();
            let api_version = api_version.to_string();
            let provider_path = provider_path.to_string();
            let resource_type = resource_type.to_string();
            let family = family.to_string();
            workers.spawn(async move {
                let found = adapter
                    .discover_family(&token, &creds, &provider_path, &api_version, &resource_type, &family)
                    .await;
                ctx.report_progress(PROVIDER, family, found.len());
                found
            });
        }

        let mut resources = Vec::new();
        while let Some(joined) = workers.join_next().await {
            if let Ok(found) = joined {
                resources.extend(found);
            }
        }
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tags_flatten_dropping_nulls() {
        let native = json!({"tags": {"env": "prod", "owner": null}});
        let tags = tags_of(&native);
        assert_eq!(tags.get("env").map(String::as_str), Some("prod"));
        assert!(!tags.contains_key("owner"));
    }

    #[test]
    fn to_resource_drops_entries_missing_required_fields() {
        let native = json!({"name": "no-id"});
        assert!(to_resource(&native, "azure_storage_account", None).is_none());
    }

    #[test]
    fn to_resource_maps_location_and_properties() {
        let native = json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/acct",
            "name": "acct",
            "location": "eastus",
            "tags": {"environment": "prod"},
            "properties": {"accessTier": "Hot"}
        });
        let resource = to_resource(&native, "azure_storage_account", None).unwrap();
        assert_eq!(resource.region, "eastus");
        assert_eq!(resource.tags.get("environment").map(String::as_str), Some("prod"));
        assert_eq!(
            resource.properties.get("accessTier").and_then(|v| v.as_str()),
            Some("Hot")
        );
    }
}
