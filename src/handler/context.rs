use std::sync::Arc;
use std::time::Duration;

use crate::common::application::ApplicationConfig;
use crate::common::config::AgentConfig;
use crate::common::error::{AgentError, AgentResult};
use crate::provision::supervisor::Daemons;
use crate::state::app_locks::AppLocks;
use crate::state::config_store::ConfigStore;
use crate::state::node_directory::NodeDirectory;
use crate::state::port_registry::PortRegistry;
use crate::state::task_queue::TaskQueue;
use crate::storage::kv_store_impl::KvStoreImpl;
use crate::traits::process_runner::ProcessRunner;

/// Everything a deployment operation touches, built once per agent.
#[derive(Clone)]
pub struct HandlerContext {
    pub config: Arc<AgentConfig>,
    pub store: Arc<KvStoreImpl>,
    pub runner: Arc<dyn ProcessRunner>,
    pub configs: ConfigStore,
    pub ports: PortRegistry,
    pub directory: NodeDirectory,
    pub locks: AppLocks,
    pub queue: TaskQueue,
}

impl HandlerContext {
    pub fn new(config: Arc<AgentConfig>, store: Arc<KvStoreImpl>, runner: Arc<dyn ProcessRunner>) -> Self {
        let node = config.node_name.as_str();
        Self {
            configs: ConfigStore::new(store.clone()),
            ports: PortRegistry::new(store.clone(), node, &config.ports),
            directory: NodeDirectory::new(store.clone(), node),
            locks: AppLocks::new(
                store.clone(),
                config.runtime.lock_ttl_secs,
                Duration::from_secs(config.runtime.lock_ttl_secs),
            ),
            queue: TaskQueue::new(store.clone(), node, config.queue.result_ttl_secs),
            config,
            store,
            runner,
        }
    }

    pub fn node(&self) -> &str {
        &self.config.node_name
    }

    pub fn daemons(&self) -> Daemons<'_> {
        Daemons::new(self.runner.as_ref(), &self.config.runtime, &self.config.paths)
    }

    /// Stored config of a deployed application.
    pub async fn deployed_config(&self, app: &str) -> AgentResult<ApplicationConfig> {
        self.configs
            .get(app)
            .await?
            .ok_or_else(|| AgentError::NotDeployed(app.to_string()))
    }
}
