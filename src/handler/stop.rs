use crate::common::application::ApplicationConfig;
use crate::common::error::AgentResult;
use crate::common::report::StepReport;
use crate::handler::context::HandlerContext;

pub async fn handle_stop_application(ctx: &HandlerContext, app: &str) -> AgentResult<StepReport> {
    log::info!("Stopping application {}", app);
    let config = ctx.deployed_config(app).await?;
    Ok(stop_instances(ctx, &config).await)
}

/// Quits the proxy and stops the supervised program of every instance on
/// this node, then kills leftovers. Instances without generated files are
/// skipped.
pub async fn stop_instances(ctx: &HandlerContext, config: &ApplicationConfig) -> StepReport {
    let daemons = ctx.daemons();
    let mut report = StepReport::new();
    for &port in config.ports(ctx.node()) {
        let layout = daemons.layout(&config.name, port);
        if layout.proxy_conf.exists() {
            report.command(
                format!("proxy:quit:{}", layout.name),
                daemons.proxy_quit(&layout).await,
            );
        } else {
            log::debug!("No proxy config for {}, skipping", layout.name);
        }
        if layout.supervisor_conf.exists() {
            report.command(
                format!("supervisor:stop:{}", layout.name),
                daemons.program_stop(&layout).await,
            );
        } else {
            log::debug!("No supervisor config for {}, skipping", layout.name);
        }
    }
    let app_dir = ctx.config.paths.app_dir(&config.name);
    report.command("kill", daemons.kill_app_processes(&app_dir).await);
    report
}
