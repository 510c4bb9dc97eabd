use serde_json::{json, Value};

use crate::common::error::{AgentError, AgentResult};
use crate::common::report::StepReport;
use crate::handler::context::HandlerContext;

/// Converges the number of instances on this node to `instances`. New ports
/// are appended; surplus instances are taken from the end of the list.
pub async fn handle_scale_application(ctx: &HandlerContext, app: &str, instances: usize) -> AgentResult<Value> {
    log::info!("Scaling application {} to {} instances", app, instances);
    if instances == 0 {
        return Err(AgentError::InvalidArgument(
            "instances must be at least 1, use remove_application instead".to_string(),
        ));
    }
    if !ctx.directory.contains(app).await? {
        return Err(AgentError::NotDeployed(app.to_string()));
    }
    let mut config = ctx.deployed_config(app).await?;
    let node = ctx.node().to_string();
    let daemons = ctx.daemons();
    let mut report = StepReport::new();

    let mut ports = config.ports(&node).to_vec();
    let mut added = Vec::new();
    while ports.len() < instances {
        let port = match ctx.ports.allocate().await {
            Ok(port) => port,
            Err(e) => {
                release_claimed(ctx, &added).await;
                return Err(e);
            }
        };
        ports.push(port);
        added.push(port);
    }

    let mut removed = Vec::new();
    while ports.len() > instances {
        let Some(port) = ports.pop() else {
            break;
        };
        let layout = daemons.layout(app, port);
        if layout.proxy_conf.exists() {
            report.command(format!("proxy:quit:{}", layout.name), daemons.proxy_quit(&layout).await);
        }
        if layout.supervisor_conf.exists() {
            report.command(
                format!("supervisor:stop:{}", layout.name),
                daemons.program_stop(&layout).await,
            );
        }
        if let Err(e) = daemons.remove_instance_configs(&layout).await {
            report.error(format!("remove:{}", layout.name), e.to_string());
        }
        removed.push(port);
    }

    config.instances.insert(node.clone(), ports.clone());
    if let Err(e) = ctx.configs.put(&config).await {
        release_claimed(ctx, &added).await;
        return Err(e);
    }
    for &port in &removed {
        if let Err(e) = ctx.ports.release(port).await {
            report.error(format!("release:{}", port), e.to_string());
        }
    }

    for &port in &ports {
        let layout = daemons.layout(app, port);
        match daemons.write_instance_configs(&layout, &config.runtime_args).await {
            Ok(()) => report.output(format!("configure:{}", layout.name), layout.supervisor_conf.display().to_string()),
            Err(e) => report.error(format!("configure:{}", layout.name), e.to_string()),
        }
    }
    report.command("supervisor:update", daemons.reload().await);

    // update already started the added programs, autostart is on
    for &port in &added {
        let layout = daemons.layout(app, port);
        report.command(format!("proxy:start:{}", layout.name), daemons.proxy_start(&layout).await);
    }

    log::info!("Scaled {} on {}: +{:?} -{:?}", app, node, added, removed);
    let mut value = report.into_value();
    value["ports"] = json!(ports);
    value["added"] = json!(added);
    value["removed"] = json!(removed);
    Ok(value)
}

/// Gives back ports this call claimed before it failed.
async fn release_claimed(ctx: &HandlerContext, ports: &[u16]) {
    for &port in ports {
        if let Err(e) = ctx.ports.release(port).await {
            log::error!("Failed to release port {}: {}", port, e);
        }
    }
}
