use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;

/// Key/value substrate behind config, port, directory, queue and heartbeat
/// state. Set and list mutations are single atomic steps on the backend.
#[trait_variant::make(KvStore: Send)]
pub trait UnsendKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
    /// Sets only when absent; returns whether this call created the key.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool>;
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()>;
    async fn del(&self, key: &str) -> Result<usize>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
    /// Returns true when `member` was not in the set before.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool>;
    async fn srem(&self, key: &str, member: &str) -> Result<bool>;
    async fn sismember(&self, key: &str, member: &str) -> Result<bool>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;
    async fn rpush(&self, key: &str, value: &str) -> Result<()>;
    /// Blocks until an element can be popped from the head or `timeout` passes.
    async fn blpop(&self, key: &str, timeout: Duration) -> Result<Option<String>>;
    async fn lrange_all(&self, key: &str) -> Result<Vec<String>>;
    async fn lrem(&self, key: &str, value: &str) -> Result<usize>;
    async fn publish(&self, channel: &str, message: &str) -> Result<()>;
    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>>;
}
