use std::sync::Arc;
use tokio::sync::watch;

use crate::common::cluster::NodeAnnouncement;
use crate::common::config::AgentConfig;
use crate::storage::kv_store_impl::KvStoreImpl;
use crate::traits::kv_store::KvStore;
use anyhow::Result;

/// Tells clients this node is up.
pub async fn announce_availability(config: &AgentConfig, store: &KvStoreImpl) -> Result<()> {
    let announcement = NodeAnnouncement {
        node: config.node_name.clone(),
        status: "available".to_string(),
        version: config.version.clone(),
    };
    let payload = serde_json::to_string(&announcement)?;
    store.publish(&config.heartbeat.client_channel, &payload).await?;
    log::info!("Announced {} on {}", config.node_name, config.heartbeat.client_channel);
    Ok(())
}

/// Logs every message broadcast on the master channel until shutdown or
/// until the subscription closes. Returns how many messages were seen.
pub async fn run_master_listener(
    config: Arc<AgentConfig>,
    store: Arc<KvStoreImpl>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<usize> {
    let channel = config.heartbeat.master_channel.clone();
    let mut messages = store.subscribe(&channel).await?;
    log::info!("Listening on {}", channel);
    let mut seen = 0;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            message = messages.recv() => match message {
                Some(message) => {
                    seen += 1;
                    log::info!("[{}] {}", channel, message);
                }
                None => {
                    log::warn!("Subscription to {} closed", channel);
                    break;
                }
            },
        }
    }
    log::info!("Stopped listening on {} after {} messages", channel, seen);
    Ok(seen)
}
