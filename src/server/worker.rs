use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use crate::common::error::{AgentError, AgentResult};
use crate::common::task::Task;
use crate::common::utils::jittered_delay;
use crate::handler::context::HandlerContext;
use crate::server::dispatch::dispatch;

const STORAGE_RETRY_MS: u64 = 1000;

/// Drains the node's queue one task at a time until shutdown.
pub async fn run_worker(worker_id: usize, ctx: HandlerContext, mut shutdown: watch::Receiver<bool>) {
    let timeout = Duration::from_secs(ctx.config.queue.pop_timeout_secs);
    log::info!("Worker {} started on {}", worker_id, ctx.node());
    loop {
        if *shutdown.borrow() {
            break;
        }
        let popped = tokio::select! {
            _ = shutdown.changed() => break,
            popped = ctx.queue.pop(timeout) => popped,
        };
        match popped {
            Ok(Some(task)) => {
                if let Err(e) = process_task(&ctx, task).await {
                    log::error!("Worker {}: {}", worker_id, e);
                }
            }
            Ok(None) => continue,
            Err(e) => {
                log::error!("Worker {} failed to pop task: {}", worker_id, e);
                tokio::time::sleep(Duration::from_millis(jittered_delay(STORAGE_RETRY_MS))).await;
            }
        }
    }
    log::info!("Worker {} stopped", worker_id);
}

/// Pops and runs a single task. Returns the task id, or `None` when the
/// queue stayed empty for `timeout`.
pub async fn run_next_task(ctx: &HandlerContext, timeout: Duration) -> AgentResult<Option<Uuid>> {
    let Some(task) = ctx.queue.pop(timeout).await? else {
        return Ok(None);
    };
    let task_id = task.id;
    process_task(ctx, task).await?;
    Ok(Some(task_id))
}

/// Runs one task and records its outcome. The operation runs on its own
/// tokio task so a panic ends up as an error record. Failing to write a
/// record is returned to the caller; the task is not retried.
pub async fn process_task(ctx: &HandlerContext, task: Task) -> AgentResult<()> {
    log::info!("Task {} started: {}", task.id, task.operation.name());
    ctx.queue.mark_running(&task).await?;

    let task_id = task.id;
    let op_ctx = ctx.clone();
    let outcome = tokio::spawn(async move { dispatch(&task.operation, &op_ctx).await })
        .await
        .unwrap_or_else(|e| Err(AgentError::Aborted(e.to_string())));

    match outcome {
        Ok(result) => {
            log::info!("Task {} complete", task_id);
            ctx.queue.mark_complete(task_id, result).await
        }
        Err(e) => {
            log::warn!("Task {} failed: {}", task_id, e);
            ctx.queue.mark_error(task_id, &e.to_string()).await
        }
    }
}
