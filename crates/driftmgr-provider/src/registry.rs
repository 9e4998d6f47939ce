use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::ProviderAdapter;

/// Holds one [`ProviderAdapter`] per provider name, used by the discovery
/// engine to fan out a job to every registered adapter (spec §4.2). Keyed
/// by provider name rather than a closed enum, since resources carry a
/// `provider: String`.
#[derive(Default)]
pub struct Registry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) -> &mut Self {
        self.adapters.insert(adapter.name().to_string(), adapter);
        self
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider).cloned()
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn all(&self) -> Vec<Arc<dyn ProviderAdapter>> {
        self.adapters.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DiscoveryContext;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use driftmgr_core::Resource;

    struct Dummy;

    #[async_trait]
    impl ProviderAdapter for Dummy {
        fn name(&self) -> &'static str {
            "dummy"
        }
        async fn discover_all(&self, _ctx: &DiscoveryContext, _regions: &[String]) -> Result<Vec<Resource>, ProviderError> {
            Ok(vec![])
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Dummy));
        assert!(registry.get("dummy").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.provider_names(), vec!["dummy".to_string()]);
    }
}
