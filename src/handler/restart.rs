use crate::common::application::ApplicationConfig;
use crate::common::error::AgentResult;
use crate::common::report::StepReport;
use crate::handler::context::HandlerContext;
use crate::handler::stop::stop_instances;

pub async fn handle_restart_application(ctx: &HandlerContext, app: &str) -> AgentResult<StepReport> {
    log::info!("Restarting application {}", app);
    let config = ctx.deployed_config(app).await?;
    Ok(restart_instances(ctx, &config).await)
}

/// Stop then start every instance on this node. Starting an instance whose
/// files were never generated is recorded as an error for that instance.
pub async fn restart_instances(ctx: &HandlerContext, config: &ApplicationConfig) -> StepReport {
    let daemons = ctx.daemons();
    let mut report = StepReport::new();

    let state_dir = ctx.config.paths.state_dir();
    if state_dir.exists() {
        report.command("chown", daemons.chown(&state_dir).await);
    }

    report.absorb(stop_instances(ctx, config).await);

    for &port in config.ports(ctx.node()) {
        let layout = daemons.layout(&config.name, port);
        if !layout.proxy_conf.exists() || !layout.supervisor_conf.exists() {
            report.error(format!("start:{}", layout.name), "instance is not configured");
            continue;
        }
        report.command(
            format!("proxy:start:{}", layout.name),
            daemons.proxy_start(&layout).await,
        );
        report.command(
            format!("supervisor:start:{}", layout.name),
            daemons.program_start(&layout).await,
        );
    }
    report
}
