use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A canonical cloud resource, normalised from whatever shape a provider SDK
/// handed us. One [`Resource`] exists per (provider, id) pair within a single
/// discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Provider-unique identifier. Never empty.
    pub id: String,
    pub name: String,
    /// Provider-namespaced type, e.g. `azure_storage_account`.
    #[serde(rename = "type")]
    pub resource_type: String,
    pub provider: String,
    /// Region slug, or `"global"` for globally-scoped resource families.
    pub region: String,
    /// Provider-specific lifecycle token, or `"active"` when the provider
    /// doesn't report one.
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Provider-specific attributes. Schemaless by design — see DESIGN.md.
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    /// Creation timestamp, or the Unix epoch when the provider didn't report one.
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    /// Attributes consulted by the drift diffing path. May overlap with
    /// `properties`; kept distinct because not every provider attribute is
    /// drift-relevant.
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    /// String metadata, e.g. terraform import hints.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_state() -> String {
    "active".to_string()
}

/// The Unix epoch, used as the "zero" timestamp for resources whose provider
/// didn't report a creation time (spec §3: "created_at (timestamp or zero)").
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().expect("unix epoch is a valid timestamp")
}

impl Resource {
    /// A minimal resource with required fields only. Useful for tests and for
    /// adapters assembling a record field by field.
    pub fn new(id: impl Into<String>, name: impl Into<String>, resource_type: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            resource_type: resource_type.into(),
            provider: provider.into(),
            region: "global".to_string(),
            state: default_state(),
            tags: HashMap::new(),
            properties: HashMap::new(),
            created_at: epoch(),
            attributes: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// True when the resource has the two fields every adapter must populate
    /// before it is allowed into a discovery result (spec §4.1: "silently
    /// dropping entries whose required fields (id, name/location) are
    /// absent").
    pub fn has_required_fields(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty()
    }
}

/// Flatten an Azure-style map-of-maybe-string tag set into string→string,
/// dropping nil values. Duplicate keys are last-write-wins in input order.
pub fn normalize_map_tags<I, K>(tags: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, Option<String>)>,
    K: Into<String>,
{
    let mut out = HashMap::new();
    for (k, v) in tags {
        if let Some(v) = v {
            out.insert(k.into(), v);
        }
    }
    out
}

/// Flatten a DigitalOcean-style list of `"k:v"` or bare-string tags into
/// string→string. A bare string `"foo"` becomes `"foo" -> "foo"`; a tag with
/// no value after the first `:` (`"foo:"`) becomes `"foo" -> ""`.
pub fn normalize_list_tags<I, S>(tags: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = HashMap::new();
    for tag in tags {
        let tag = tag.as_ref();
        match tag.split_once(':') {
            Some((k, v)) => {
                out.insert(k.to_string(), v.to_string());
            }
            None => {
                out.insert(tag.to_string(), tag.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_fields_reject_empty_id() {
        let r = Resource::new("", "web", "aws_instance", "aws");
        assert!(!r.has_required_fields());
    }

    #[test]
    fn required_fields_accept_populated() {
        let r = Resource::new("i-1", "web", "aws_instance", "aws");
        assert!(r.has_required_fields());
    }

    #[test]
    fn map_tags_drop_nils() {
        let tags = vec![
            ("env".to_string(), Some("prod".to_string())),
            ("owner".to_string(), None),
        ];
        let out = normalize_map_tags(tags);
        assert_eq!(out.get("env").map(String::as_str), Some("prod"));
        assert!(!out.contains_key("owner"));
    }

    #[test]
    fn list_tags_split_on_first_colon() {
        let out = normalize_list_tags(vec!["env:prod", "managed-by:driftmgr", "ephemeral"]);
        assert_eq!(out.get("env").map(String::as_str), Some("prod"));
        assert_eq!(out.get("managed-by").map(String::as_str), Some("driftmgr"));
        assert_eq!(out.get("ephemeral").map(String::as_str), Some("ephemeral"));
    }

    #[test]
    fn list_tags_with_colon_in_value_splits_on_first() {
        let out = normalize_list_tags(vec!["url:https://example.com"]);
        assert_eq!(out.get("url").map(String::as_str), Some("https://example.com"));
    }
}
