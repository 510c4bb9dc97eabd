use std::sync::Arc;

use crate::common::application::ApplicationConfig;
use crate::common::error::{AgentError, AgentResult};
use crate::common::keys::{application_key, application_pattern};
use crate::storage::kv_store_impl::KvStoreImpl;
use crate::traits::kv_store::KvStore;

/// Persistence of per-application JSON configuration.
#[derive(Clone)]
pub struct ConfigStore {
    store: Arc<KvStoreImpl>,
}

impl ConfigStore {
    pub fn new(store: Arc<KvStoreImpl>) -> Self {
        Self { store }
    }

    pub async fn get(&self, app: &str) -> AgentResult<Option<ApplicationConfig>> {
        let Some(raw) = self.store.get(&application_key(app)).await? else {
            return Ok(None);
        };
        let config = serde_json::from_str(&raw).map_err(|e| AgentError::ConfigCorrupt {
            application: app.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(config))
    }

    pub async fn put(&self, config: &ApplicationConfig) -> AgentResult<()> {
        let value = serde_json::to_string(config)?;
        self.store.set(&application_key(&config.name), &value).await?;
        log::debug!("Saved config for application {}", config.name);
        Ok(())
    }

    pub async fn delete(&self, app: &str) -> AgentResult<bool> {
        Ok(self.store.del(&application_key(app)).await? > 0)
    }

    pub async fn list(&self) -> AgentResult<Vec<String>> {
        let prefix = application_key("");
        let mut names: Vec<String> = self
            .store
            .keys(application_pattern())
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::memory_store::MemoryStore;

    fn config_store() -> (Arc<KvStoreImpl>, ConfigStore) {
        let store = Arc::new(KvStoreImpl::Memory(MemoryStore::new()));
        (store.clone(), ConfigStore::new(store))
    }

    #[tokio::test]
    async fn put_get_delete() {
        let (_, configs) = config_store();
        assert_eq!(configs.get("demo").await.unwrap(), None);
        let mut config = ApplicationConfig::new("demo");
        config.instances.insert("node1".into(), vec![15000]);
        configs.put(&config).await.unwrap();
        assert_eq!(configs.get("demo").await.unwrap(), Some(config));
        assert_eq!(configs.list().await.unwrap(), vec!["demo".to_string()]);
        assert!(configs.delete("demo").await.unwrap());
        assert!(!configs.delete("demo").await.unwrap());
    }

    #[tokio::test]
    async fn unparsable_config_is_corrupt() {
        let (store, configs) = config_store();
        store.set(&application_key("demo"), "{not json").await.unwrap();
        let err = configs.get("demo").await.unwrap_err();
        assert!(matches!(err, AgentError::ConfigCorrupt { .. }));
    }
}
