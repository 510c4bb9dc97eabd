use std::sync::Arc;

use crate::common::error::AgentResult;
use crate::common::keys::node_applications_key;
use crate::storage::kv_store_impl::KvStoreImpl;
use crate::traits::kv_store::KvStore;

/// Names of the applications resident on one node.
#[derive(Clone)]
pub struct NodeDirectory {
    store: Arc<KvStoreImpl>,
    key: String,
}

impl NodeDirectory {
    pub fn new(store: Arc<KvStoreImpl>, node: &str) -> Self {
        Self {
            store,
            key: node_applications_key(node),
        }
    }

    pub async fn add(&self, app: &str) -> AgentResult<bool> {
        Ok(self.store.sadd(&self.key, app).await?)
    }

    pub async fn remove(&self, app: &str) -> AgentResult<bool> {
        Ok(self.store.srem(&self.key, app).await?)
    }

    pub async fn contains(&self, app: &str) -> AgentResult<bool> {
        Ok(self.store.sismember(&self.key, app).await?)
    }

    pub async fn list(&self) -> AgentResult<Vec<String>> {
        let mut apps = self.store.smembers(&self.key).await?;
        apps.sort();
        Ok(apps)
    }
}
