use std::sync::Arc;
use tokio::sync::watch;

use crate::common::config::load_agent_config;
use crate::handler::context::HandlerContext;
use crate::provision::process::SystemRunner;
use crate::server::bootstrap::{prepare_node_dirs, write_supervisord_conf};
use crate::server::cluster_heartbeat::{run_heartbeat, send_heartbeat};
use crate::server::listener::{announce_availability, run_master_listener};
use crate::server::loader::load_kv_store;
use crate::server::worker::run_worker;

pub async fn agent_start(config_path: &str) -> anyhow::Result<()> {
    env_logger::init();
    log::info!("Starting deployment agent...");
    let config = Arc::new(load_agent_config(config_path)?);
    log::info!(
        "Node {} ({}:{}), version {}",
        config.node_name,
        config.address,
        config.port,
        config.version
    );

    let store = Arc::new(load_kv_store(&config.storage).await?);
    prepare_node_dirs(&config.paths).await?;
    write_supervisord_conf(env!("CARGO_PKG_NAME"), &config.paths).await?;

    let runner = Arc::new(SystemRunner::new(config.runtime.command_timeout()));
    let ctx = HandlerContext::new(config.clone(), store.clone(), runner);

    // first beat before announcing so clients find the record
    send_heartbeat(&config, &store).await?;
    if let Err(e) = announce_availability(&config, &store).await {
        log::warn!("Failed to announce availability: {:?}", e);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();
    handles.push(tokio::spawn(run_heartbeat(
        config.clone(),
        store.clone(),
        shutdown_rx.clone(),
    )));
    {
        let (config, store, shutdown) = (config.clone(), store.clone(), shutdown_rx.clone());
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_master_listener(config, store, shutdown).await {
                log::error!("Master listener error: {:?}", e);
            }
        }));
    }
    for worker_id in 0..config.queue.workers.max(1) {
        handles.push(tokio::spawn(run_worker(
            worker_id,
            ctx.clone(),
            shutdown_rx.clone(),
        )));
    }

    tokio::signal::ctrl_c().await?;
    log::info!("Shutdown requested, finishing running tasks...");
    shutdown_tx.send(true)?;
    for handle in handles {
        if let Err(e) = handle.await {
            log::error!("Background task failed: {:?}", e);
        }
    }
    log::info!("Agent stopped");
    Ok(())
}
