use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::common::error::AgentResult;
use crate::common::keys::{queue_key, task_key, task_pattern};
use crate::common::task::{Operation, Task, TaskRecord, TaskStatus};
use crate::storage::kv_store_impl::KvStoreImpl;
use crate::traits::kv_store::KvStore;

/// Durable per-node FIFO of tasks plus one status record per dequeued task.
#[derive(Clone)]
pub struct TaskQueue {
    store: Arc<KvStoreImpl>,
    node: String,
    result_ttl_secs: u64,
}

/// Caller-side view of an enqueued task.
#[derive(Clone)]
pub struct TaskHandle {
    store: Arc<KvStoreImpl>,
    key: String,
    pub task_id: Uuid,
}

impl TaskHandle {
    /// Current status record; `None` while the task is still queued or
    /// after its record expired.
    pub async fn result(&self) -> AgentResult<Option<TaskRecord>> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Polls until the task finished or `timeout` passed.
    pub async fn wait(&self, timeout: Duration, poll: Duration) -> AgentResult<Option<TaskRecord>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(record) = self.result().await? {
                if record.status.is_finished() {
                    return Ok(Some(record));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(poll).await;
        }
    }
}

impl TaskQueue {
    pub fn new(store: Arc<KvStoreImpl>, node: &str, result_ttl_secs: u64) -> Self {
        Self {
            store,
            node: node.to_string(),
            result_ttl_secs,
        }
    }

    fn handle(&self, task_id: Uuid) -> TaskHandle {
        TaskHandle {
            store: self.store.clone(),
            key: task_key(&self.node, &task_id.to_string()),
            task_id,
        }
    }

    pub async fn enqueue(&self, operation: Operation) -> AgentResult<TaskHandle> {
        let task = Task::new(operation);
        let payload = serde_json::to_string(&task)?;
        self.store.rpush(&queue_key(&self.node), &payload).await?;
        log::info!("Queued task {} ({})", task.id, task.operation.name());
        Ok(self.handle(task.id))
    }

    /// Enqueues by registry name; unknown names never reach the queue.
    pub async fn enqueue_named(&self, name: &str, args: serde_json::Value) -> AgentResult<TaskHandle> {
        let operation = Operation::from_name(name, args)?;
        self.enqueue(operation).await
    }

    /// Blocking pop. Each queued task is handed to exactly one caller.
    pub async fn pop(&self, timeout: Duration) -> AgentResult<Option<Task>> {
        let Some(raw) = self.store.blpop(&queue_key(&self.node), timeout).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn write_record(&self, task_id: Uuid, status: TaskStatus, result: serde_json::Value) -> AgentResult<()> {
        let record = TaskRecord {
            task_id,
            date: Utc::now(),
            status,
            result,
        };
        let key = task_key(&self.node, &task_id.to_string());
        let value = serde_json::to_string(&record)?;
        if status.is_finished() {
            self.store.set_ex(&key, &value, self.result_ttl_secs).await?;
        } else {
            self.store.set(&key, &value).await?;
        }
        Ok(())
    }

    pub async fn mark_running(&self, task: &Task) -> AgentResult<()> {
        self.write_record(task.id, TaskStatus::Running, serde_json::Value::Null)
            .await
    }

    pub async fn mark_complete(&self, task_id: Uuid, result: serde_json::Value) -> AgentResult<()> {
        self.write_record(task_id, TaskStatus::Complete, result).await
    }

    pub async fn mark_error(&self, task_id: Uuid, message: &str) -> AgentResult<()> {
        self.write_record(task_id, TaskStatus::Error, serde_json::Value::String(message.to_string()))
            .await
    }

    pub async fn status(&self, task_id: Uuid) -> AgentResult<Option<TaskRecord>> {
        self.handle(task_id).result().await
    }

    /// Tasks still waiting in the queue, oldest first.
    pub async fn pending(&self) -> AgentResult<Vec<Task>> {
        let raw = self.store.lrange_all(&queue_key(&self.node)).await?;
        Ok(raw
            .iter()
            .filter_map(|r| match serde_json::from_str(r) {
                Ok(task) => Some(task),
                Err(e) => {
                    log::warn!("Skipping undecodable queue entry: {}", e);
                    None
                }
            })
            .collect())
    }

    /// Status records of dequeued tasks that have not expired yet.
    pub async fn records(&self) -> AgentResult<Vec<TaskRecord>> {
        let mut records = Vec::new();
        for key in self.store.keys(&task_pattern(&self.node)).await? {
            if let Some(raw) = self.store.get(&key).await? {
                match serde_json::from_str::<TaskRecord>(&raw) {
                    Ok(record) => records.push(record),
                    Err(e) => log::warn!("Skipping undecodable task record {}: {}", key, e),
                }
            }
        }
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    /// Drops a task's status record, or the queued task itself if it has
    /// not been picked up yet.
    pub async fn delete(&self, task_id: Uuid) -> AgentResult<bool> {
        let key = task_key(&self.node, &task_id.to_string());
        if self.store.del(&key).await? > 0 {
            return Ok(true);
        }
        let queue = queue_key(&self.node);
        for raw in self.store.lrange_all(&queue).await? {
            let matches = serde_json::from_str::<Task>(&raw).is_ok_and(|t| t.id == task_id);
            if matches {
                return Ok(self.store.lrem(&queue, &raw).await? > 0);
            }
        }
        Ok(false)
    }

    /// Empties the queue and every status record of this node.
    pub async fn clear(&self) -> AgentResult<usize> {
        let mut removed = self.store.lrange_all(&queue_key(&self.node)).await?.len();
        self.store.del(&queue_key(&self.node)).await?;
        for key in self.store.keys(&task_pattern(&self.node)).await? {
            removed += self.store.del(&key).await?;
        }
        log::info!("Cleared {} tasks on {}", removed, self.node);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::memory_store::MemoryStore;

    fn queue() -> TaskQueue {
        let store = Arc::new(KvStoreImpl::Memory(MemoryStore::new()));
        TaskQueue::new(store, "node1", 60)
    }

    fn stop(app: &str) -> Operation {
        Operation::StopApplication {
            application: app.to_string(),
        }
    }

    #[tokio::test]
    async fn fifo_order_and_single_delivery() {
        let queue = queue();
        let first = queue.enqueue(stop("a")).await.unwrap();
        let second = queue.enqueue(stop("b")).await.unwrap();
        let popped = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(popped.id, first.task_id);
        let popped = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(popped.id, second.task_id);
        assert!(queue.pop(Duration::from_millis(10)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_lifecycle() {
        let queue = queue();
        let handle = queue.enqueue(stop("a")).await.unwrap();
        assert!(handle.result().await.unwrap().is_none());
        let task = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        queue.mark_running(&task).await.unwrap();
        assert_eq!(handle.result().await.unwrap().unwrap().status, TaskStatus::Running);
        queue
            .mark_complete(task.id, serde_json::json!({"output": {}, "errors": {}}))
            .await
            .unwrap();
        let record = handle
            .wait(Duration::from_millis(50), Duration::from_millis(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, TaskStatus::Complete);
        assert_eq!(record.task_id, task.id);
        assert_eq!(queue.records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_name_is_not_queued() {
        let queue = queue();
        assert!(queue.enqueue_named("format_disk", serde_json::json!({})).await.is_err());
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_queued_and_finished() {
        let queue = queue();
        let queued = queue.enqueue(stop("a")).await.unwrap();
        let finished = queue.enqueue(stop("b")).await.unwrap();
        assert!(queue.delete(queued.task_id).await.unwrap());
        let task = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(task.id, finished.task_id);
        queue.mark_error(task.id, "boom").await.unwrap();
        assert!(queue.delete(finished.task_id).await.unwrap());
        assert!(!queue.delete(finished.task_id).await.unwrap());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let queue = queue();
        queue.enqueue(stop("a")).await.unwrap();
        queue.enqueue(stop("b")).await.unwrap();
        let task = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        queue.mark_error(task.id, "boom").await.unwrap();
        assert_eq!(queue.clear().await.unwrap(), 2);
        assert!(queue.pending().await.unwrap().is_empty());
        assert!(queue.records().await.unwrap().is_empty());
    }
}
