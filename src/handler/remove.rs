use crate::common::error::{AgentError, AgentResult};
use crate::common::report::StepReport;
use crate::handler::context::HandlerContext;
use crate::handler::stop::stop_instances;
use crate::provision::source::remove_tree;

/// Tears an application down on this node. Every deletion checks for
/// existence first, so a half-finished removal can simply be run again.
pub async fn handle_remove_application(ctx: &HandlerContext, app: &str) -> AgentResult<StepReport> {
    log::info!("Removing application {}", app);
    if !ctx.directory.contains(app).await? {
        return Err(AgentError::NotDeployed(app.to_string()));
    }
    let node = ctx.node().to_string();
    let config = ctx.configs.get(app).await?;
    let paths = &ctx.config.paths;
    let daemons = ctx.daemons();
    let mut report = StepReport::new();

    if let Some(config) = &config {
        // failures here are already logged and must not block the removal
        let stopped = stop_instances(ctx, config).await;
        report.output.extend(stopped.output);
    }

    for (step, dir) in [
        ("remove:state", paths.app_state_dir(app)),
        ("remove:source", paths.app_dir(app)),
        ("remove:environment", paths.app_env_dir(app)),
    ] {
        match remove_tree(&dir).await {
            Ok(()) => report.output(step, dir.display().to_string()),
            Err(e) => report.error(step, e.to_string()),
        }
    }

    match daemons.remove_app_configs(app).await {
        Ok(removed) => report.output("remove:configs", format!("{} files removed", removed.len())),
        Err(e) => report.error("remove:configs", e.to_string()),
    }
    match daemons.remove_app_logs(app).await {
        Ok(removed) => report.output("remove:logs", format!("{} files removed", removed.len())),
        Err(e) => report.error("remove:logs", e.to_string()),
    }

    if let Some(mut config) = config {
        for &port in config.ports(&node) {
            ctx.ports.release(port).await?;
        }
        config.instances.remove(&node);
        // other nodes may still run the application
        if config.instances.is_empty() {
            ctx.configs.delete(app).await?;
        } else {
            ctx.configs.put(&config).await?;
        }
    }
    ctx.directory.remove(app).await?;

    report.command("supervisor:update", daemons.reload().await);
    log::info!("Removed application {} from {}", app, node);
    Ok(report)
}
