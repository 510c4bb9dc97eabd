use serde_json::Value;
use std::future::Future;

use crate::common::error::AgentResult;
use crate::common::task::Operation;
use crate::handler::context::HandlerContext;
use crate::handler::deploy::{handle_deploy_app, DeployOptions};
use crate::handler::remove::handle_remove_application;
use crate::handler::restart::handle_restart_application;
use crate::handler::scale::handle_scale_application;
use crate::handler::stop::handle_stop_application;

/// Runs a dequeued operation. Everything except deploy runs under the
/// application's lock; deploy locks once it has read the manifest.
pub async fn dispatch(operation: &Operation, ctx: &HandlerContext) -> AgentResult<Value> {
    log::debug!("Dispatching {:?}", operation);
    match operation {
        Operation::DeployApp {
            package,
            skip_provision,
            force_provision,
        } => {
            let options = DeployOptions {
                skip_provision: *skip_provision,
                force_provision: *force_provision,
            };
            handle_deploy_app(ctx, package, options).await
        }
        Operation::StopApplication { application } => {
            with_app_lock(ctx, application, move || async move {
                Ok(handle_stop_application(ctx, application).await?.into_value())
            })
            .await
        }
        Operation::RestartApplication { application } => {
            with_app_lock(ctx, application, move || async move {
                Ok(handle_restart_application(ctx, application).await?.into_value())
            })
            .await
        }
        Operation::RemoveApplication { application } => {
            with_app_lock(ctx, application, move || async move {
                Ok(handle_remove_application(ctx, application).await?.into_value())
            })
            .await
        }
        Operation::ScaleApplication {
            application,
            instances,
        } => {
            let instances = *instances;
            with_app_lock(ctx, application, move || async move {
                handle_scale_application(ctx, application, instances).await
            })
            .await
        }
    }
}

async fn with_app_lock<F, Fut>(ctx: &HandlerContext, app: &str, run: F) -> AgentResult<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = AgentResult<Value>>,
{
    let guard = ctx.locks.acquire(app).await?;
    let result = run().await;
    if let Err(e) = guard.release().await {
        log::warn!("Failed to release lock for {}: {}", app, e);
    }
    result
}
