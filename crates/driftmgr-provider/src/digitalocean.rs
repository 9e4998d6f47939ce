use std::path::PathBuf;

use async_trait::async_trait;
use driftmgr_core::{normalize_list_tags, Resource};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::driver::{DiscoveryContext, ProviderAdapter};
use crate::error::ProviderError;

const PROVIDER: &str = "digitalocean";
const API_BASE: &str = "https://api.digitalocean.com/v2";

/// DigitalOcean credential discovery order (spec §6): environment variables
/// first (three accepted names, all observed in the wild), then
/// `~/.digitalocean/credentials`, then doctl's own config YAML.
fn token_from_env() -> Option<String> {
    std::env::var("DIGITALOCEAN_TOKEN")
        .or_else(|_| std::env::var("DO_TOKEN"))
        .or_else(|_| std::env::var("DIGITAL_OCEAN_TOKEN"))
        .ok()
}

fn token_from_credentials_file() -> Option<String> {
    let home = dirs_home()?;
    let path = home.join(".digitalocean").join("credentials");
    let content = std::fs::read_to_string(path).ok()?;
    content.trim().lines().next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// doctl's config YAML stores the token under an `access-token:` key. This
/// scans line-by-line rather than pulling in a YAML parser for one field.
fn token_from_doctl_config() -> Option<String> {
    let home = dirs_home()?;
    let candidates = [
        home.join(".config/doctl/config.yaml"),
        home.join("Library/Application Support/doctl/config.yaml"),
    ];
    for path in candidates {
        if let Ok(content) = std::fs::read_to_string(&path) {
            for line in content.lines() {
                if let Some(rest) = line.trim_start().strip_prefix("access-token:") {
                    let token = rest.trim().trim_matches('"').trim_matches('\'');
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }
    None
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

fn discover_token() -> Result<String, ProviderError> {
    token_from_env()
        .or_else(token_from_credentials_file)
        .or_else(token_from_doctl_config)
        .ok_or_else(|| ProviderError::CredentialsUnavailable {
            provider: PROVIDER.into(),
            reason: "no token in DIGITALOCEAN_TOKEN/DO_TOKEN/DIGITAL_OCEAN_TOKEN, \
                     ~/.digitalocean/credentials, or doctl config"
                .into(),
        })
}

/// Drain a cursor-paginated (`links.pages.next`) DO API listing.
async fn list_paginated(client: &reqwest::Client, token: &str, mut url: String, items_key: &str, family: &str) -> Vec<Value> {
    let mut items = Vec::new();
    loop {
        let resp = match client.get(&url).bearer_auth(token).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(family, error = %e, "digitalocean: page request failed, returning partial results");
                break;
            }
        };
        if !resp.status().is_success() {
            warn!(family, status = %resp.status(), "digitalocean: page returned error status, returning partial results");
            break;
        }
        let body: Value = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(family, error = %e, "digitalocean: page body undecodable, returning partial results");
                break;
            }
        };
        if let Some(values) = body.get(items_key).and_then(|v| v.as_array()) {
            items.extend(values.iter().cloned());
        }
        match body
            .get("links")
            .and_then(|l| l.get("pages"))
            .and_then(|p| p.get("next"))
            .and_then(|n| n.as_str())
        {
            Some(next) => url = next.to_string(),
            None => break,
        }
    }
    items
}

/// DigitalOcean tags come back as a bare list of strings, optionally
/// `"k:v"` (spec §4.1 "Tag normalisation": DO-style split on first ':').
fn tags_of(native: &Value) -> std::collections::HashMap<String, String> {
    let list: Vec<String> = native
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    normalize_list_tags(list)
}

fn to_resource(native: &Value, resource_type: &str, region_override: Option<&str>) -> Option<Resource> {
    let id = native
        .get("id")
        .and_then(|v| v.as_str().map(String::from).or_else(|| v.as_u64().map(|n| n.to_string())))?;
    let name = native.get("name").and_then(|v| v.as_str())?.to_string();
    if id.is_empty() || name.is_empty() {
        return None;
    }

    let region = region_override
        .map(String::from)
        .or_else(|| {
            native
                .get("region")
                .and_then(|r| r.get("slug").or(Some(r)))
                .and_then(|v| v.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| "global".to_string());

    let mut resource = Resource::new(id, name, resource_type, PROVIDER)
        .with_region(region)
        .with_tags(tags_of(native));
    resource.state = native
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("active")
        .to_string();
    if let Some(obj) = native.as_object() {
        resource.properties = obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    }
    Some(resource)
}

pub struct DigitalOceanAdapter {
    client: reqwest::Client,
}

impl DigitalOceanAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn discover_droplets(&self, token: &str) -> Vec<Resource> {
        let url = format!("{}/droplets?per_page=200", API_BASE);
        list_paginated(&self.client, token, url, "droplets", "droplets")
            .await
            .iter()
            .filter_map(|n| to_resource(n, "digitalocean_droplet", None))
            .collect()
    }

    async fn discover_volumes(&self, token: &str) -> Vec<Resource> {
        let url = format!("{}/volumes?per_page=200", API_BASE);
        list_paginated(&self.client, token, url, "volumes", "volumes")
            .await
            .iter()
            .filter_map(|n| to_resource(n, "digitalocean_volume", None))
            .collect()
    }

    async fn discover_firewalls(&self, token: &str) -> Vec<Resource> {
        let url = format!("{}/firewalls?per_page=200", API_BASE);
        list_paginated(&self.client, token, url, "firewalls", "firewalls")
            .await
            .iter()
            .filter_map(|n| to_resource(n, "digitalocean_firewall", Some("global")))
            .collect()
    }

    async fn discover_domains(&self, token: &str) -> Vec<Resource> {
        let url = format!("{}/domains?per_page=200", API_BASE);
        list_paginated(&self.client, token, url, "domains", "domains")
            .await
            .iter()
            .filter_map(|n| {
                // domains key off `name`, not `id` — DO doesn't assign one.
                let name = n.get("name").and_then(|v| v.as_str())?.to_string();
                if name.is_empty() {
                    return None;
                }
                let mut resource =
                    Resource::new(name.clone(), name, "digitalocean_domain", PROVIDER).with_region("global");
                if let Some(obj) = n.as_object() {
                    resource.properties = obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                }
                Some(resource)
            })
            .collect()
    }

    async fn discover_ssh_keys(&self, token: &str) -> Vec<Resource> {
        let url = format!("{}/account/keys?per_page=200", API_BASE);
        list_paginated(&self.client, token, url, "ssh_keys", "ssh_keys")
            .await
            .iter()
            .filter_map(|n| to_resource(n, "digitalocean_ssh_key", Some("global")))
            .collect()
    }
}

impl Default for DigitalOceanAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for DigitalOceanAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn discover_all(&self, ctx: &DiscoveryContext, _regions: &[String]) -> Result<Vec<Resource>, ProviderError> {
        let token = discover_token()?;
        debug!("digitalocean: starting discovery fan-out");

        let mut workers = JoinSet::new();
        macro_rules! spawn_family {
            ($method:ident, $family:expr) => {{
                let adapter = DigitalOceanAdapter {
                    client: self.client.clone(),
                };
                let token = token.clone();
                let ctx = ctx.clone();
                workers.spawn(async move {
                    let found = adapter.$method(&token).await;
                    ctx.report_progress(PROVIDER, $family, found.len());
                    found
                });
            }};
        }

        spawn_family!(discover_droplets, "droplets");
        spawn_family!(discover_volumes, "volumes");
        spawn_family!(discover_firewalls, "firewalls");
        spawn_family!(discover_domains, "domains");
        spawn_family!(discover_ssh_keys, "ssh_keys");

        let mut resources = Vec::new();
        while let Some(joined) = workers.join_next().await {
            if let Ok(found) = joined {
                resources.extend(found);
            }
        }
        Ok(resources)
    }
}
