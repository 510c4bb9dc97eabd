use crate::storage::memory::memory_store::MemoryStore;
use crate::storage::redis::redis_client::RedisClient;
use crate::traits::kv_store::{KvStore, UnsendKvStore};
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;

pub enum KvStoreImpl {
    Memory(MemoryStore),
    Redis(RedisClient),
}

impl KvStore for KvStoreImpl {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            KvStoreImpl::Memory(m) => m.get(key).await,
            KvStoreImpl::Redis(r) => r.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        match self {
            KvStoreImpl::Memory(m) => m.set(key, value).await,
            KvStoreImpl::Redis(r) => r.set(key, value).await,
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        match self {
            KvStoreImpl::Memory(m) => m.set_ex(key, value, ttl_secs).await,
            KvStoreImpl::Redis(r) => r.set_ex(key, value, ttl_secs).await,
        }
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        match self {
            KvStoreImpl::Memory(m) => m.set_nx_ex(key, value, ttl_secs).await,
            KvStoreImpl::Redis(r) => r.set_nx_ex(key, value, ttl_secs).await,
        }
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        match self {
            KvStoreImpl::Memory(m) => m.expire(key, ttl_secs).await,
            KvStoreImpl::Redis(r) => r.expire(key, ttl_secs).await,
        }
    }

    async fn del(&self, key: &str) -> Result<usize> {
        match self {
            KvStoreImpl::Memory(m) => m.del(key).await,
            KvStoreImpl::Redis(r) => r.del(key).await,
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        match self {
            KvStoreImpl::Memory(m) => m.keys(pattern).await,
            KvStoreImpl::Redis(r) => r.keys(pattern).await,
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        match self {
            KvStoreImpl::Memory(m) => m.sadd(key, member).await,
            KvStoreImpl::Redis(r) => r.sadd(key, member).await,
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        match self {
            KvStoreImpl::Memory(m) => m.srem(key, member).await,
            KvStoreImpl::Redis(r) => r.srem(key, member).await,
        }
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        match self {
            KvStoreImpl::Memory(m) => m.sismember(key, member).await,
            KvStoreImpl::Redis(r) => r.sismember(key, member).await,
        }
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        match self {
            KvStoreImpl::Memory(m) => m.smembers(key).await,
            KvStoreImpl::Redis(r) => r.smembers(key).await,
        }
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<()> {
        match self {
            KvStoreImpl::Memory(m) => m.rpush(key, value).await,
            KvStoreImpl::Redis(r) => r.rpush(key, value).await,
        }
    }

    async fn blpop(&self, key: &str, timeout: Duration) -> Result<Option<String>> {
        match self {
            KvStoreImpl::Memory(m) => m.blpop(key, timeout).await,
            KvStoreImpl::Redis(r) => r.blpop(key, timeout).await,
        }
    }

    async fn lrange_all(&self, key: &str) -> Result<Vec<String>> {
        match self {
            KvStoreImpl::Memory(m) => m.lrange_all(key).await,
            KvStoreImpl::Redis(r) => r.lrange_all(key).await,
        }
    }

    async fn lrem(&self, key: &str, value: &str) -> Result<usize> {
        match self {
            KvStoreImpl::Memory(m) => m.lrem(key, value).await,
            KvStoreImpl::Redis(r) => r.lrem(key, value).await,
        }
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        match self {
            KvStoreImpl::Memory(m) => m.publish(channel, message).await,
            KvStoreImpl::Redis(r) => r.publish(channel, message).await,
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>> {
        match self {
            KvStoreImpl::Memory(m) => m.subscribe(channel).await,
            KvStoreImpl::Redis(r) => r.subscribe(channel).await,
        }
    }
}
