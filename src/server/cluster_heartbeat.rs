use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::common::cluster::NodeHeartbeat;
use crate::common::config::AgentConfig;
use crate::common::keys::{heartbeat_key, heartbeat_pattern};
use crate::storage::kv_store_impl::KvStoreImpl;
use crate::traits::kv_store::KvStore;
use anyhow::Result;

pub fn current_heartbeat(config: &AgentConfig) -> NodeHeartbeat {
    let load = sysinfo::System::load_average();
    NodeHeartbeat {
        node: config.node_name.clone(),
        address: config.address.clone(),
        port: config.port,
        status: "available".to_string(),
        version: config.version.clone(),
        load: [load.one, load.five, load.fifteen],
        timestamp: chrono::Utc::now().timestamp_millis(),
    }
}

pub async fn send_heartbeat(config: &AgentConfig, store: &KvStoreImpl) -> Result<()> {
    let heartbeat = serde_json::to_string(&current_heartbeat(config))?;
    // the record disappears if this node stops beating
    match store
        .set_ex(&heartbeat_key(&config.node_name), &heartbeat, config.heartbeat.interval_secs)
        .await
    {
        Ok(()) => {
            log::debug!("Cluster Heartbeat sent successfully");
            Ok(())
        }
        Err(e) => {
            log::warn!("Failed to send heartbeat: {:?}", e);
            Err(e)
        }
    }
}

pub async fn run_heartbeat(config: Arc<AgentConfig>, store: Arc<KvStoreImpl>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_secs(config.heartbeat.interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                // failures are logged, the next tick tries again
                let _ = send_heartbeat(&config, &store).await;
            }
        }
    }
    log::info!("Heartbeat stopped");
}

/// Heartbeats of every node still alive, sorted by node name.
pub async fn cluster_nodes(store: &KvStoreImpl) -> Result<Vec<NodeHeartbeat>> {
    let mut nodes = Vec::new();
    for key in store.keys(heartbeat_pattern()).await? {
        // expired between listing and reading
        let Some(raw) = store.get(&key).await? else {
            continue;
        };
        match serde_json::from_str::<NodeHeartbeat>(&raw) {
            Ok(heartbeat) => nodes.push(heartbeat),
            Err(e) => log::warn!("Skipping malformed heartbeat {}: {}", key, e),
        }
    }
    nodes.sort_by(|a, b| a.node.cmp(&b.node));
    Ok(nodes)
}
