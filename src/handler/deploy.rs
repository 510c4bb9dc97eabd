use serde_json::{json, Value};
use std::path::Path;

use crate::common::application::ApplicationConfig;
use crate::common::error::AgentResult;
use crate::common::report::StepReport;
use crate::handler::context::HandlerContext;
use crate::handler::restart::restart_instances;
use crate::provision::environment::{provision, ProvisionRequest};
use crate::provision::package::{open_package, ExtractedPackage};
use crate::provision::source::materialize_source;

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    pub skip_provision: bool,
    pub force_provision: bool,
}

/// Deploys a package. The application name is only known once the manifest
/// is read, so the application lock is taken here rather than by the worker.
pub async fn handle_deploy_app(ctx: &HandlerContext, package: &Path, options: DeployOptions) -> AgentResult<Value> {
    log::info!("Deploying package {}", package.display());
    // a bad package fails here, before anything is written
    let package = open_package(package).await?;
    let app = package.manifest.application.clone();

    let guard = ctx.locks.acquire(&app).await?;
    let result = deploy_locked(ctx, &package, options).await;
    if let Err(e) = guard.release().await {
        log::warn!("Failed to release lock for {}: {}", app, e);
    }
    result
}

async fn deploy_locked(ctx: &HandlerContext, package: &ExtractedPackage, options: DeployOptions) -> AgentResult<Value> {
    let manifest = &package.manifest;
    let node = ctx.node().to_string();
    let paths = &ctx.config.paths;

    let mut config = ctx
        .configs
        .get(&manifest.application)
        .await?
        .unwrap_or_else(|| ApplicationConfig::new(&manifest.application));
    config.ensure_uuid();
    config.merge_manifest(manifest);

    let mut new_port = None;
    if config.ports(&node).is_empty() {
        let port = ctx.ports.allocate().await?;
        log::info!("Assigned port {} to {} on {}", port, config.name, node);
        config.instances.insert(node.clone(), vec![port]);
        new_port = Some(port);
    }
    if let Err(e) = ctx.configs.put(&config).await {
        if let Some(port) = new_port {
            if let Err(release_err) = ctx.ports.release(port).await {
                log::error!("Failed to release port {}: {}", port, release_err);
            }
        }
        return Err(e);
    }

    let mut report = StepReport::new();
    let app_dir = paths.app_dir(&config.name);
    report.absorb(
        materialize_source(ctx.runner.as_ref(), &ctx.config.runtime, &config, &package.root, &app_dir).await,
    );

    if options.skip_provision {
        report.output("provision", "skipped");
    } else {
        let env_dir = paths.app_env_dir(&config.name);
        let request = ProvisionRequest {
            env_dir: &env_dir,
            packages: &config.packages,
            requirements: package.requirements.as_deref(),
            runtime: config.runtime.as_deref(),
            force: options.force_provision,
        };
        report.absorb(provision(ctx.runner.as_ref(), &ctx.config.runtime, &request).await);
    }

    let daemons = ctx.daemons();
    for &port in config.ports(&node) {
        let layout = daemons.layout(&config.name, port);
        match daemons.write_instance_configs(&layout, &config.runtime_args).await {
            Ok(()) => report.output(format!("configure:{}", layout.name), layout.supervisor_conf.display().to_string()),
            Err(e) => report.error(format!("configure:{}", layout.name), e.to_string()),
        }
    }
    report.command("supervisor:update", daemons.reload().await);

    ctx.directory.add(&config.name).await?;
    report.absorb(restart_instances(ctx, &config).await);

    log::info!(
        "Deployed {} version {} ({} errors)",
        config.name,
        config.version.as_deref().unwrap_or("-"),
        report.errors.len()
    );
    let mut value = report.into_value();
    value["application"] = json!(config.name);
    value["version"] = json!(config.version);
    value["ports"] = json!(config.ports(&node));
    Ok(value)
}
