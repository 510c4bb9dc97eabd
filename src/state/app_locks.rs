use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use crate::common::error::{AgentError, AgentResult};
use crate::common::keys::application_lock_key;
use crate::common::utils::jittered_delay;
use crate::storage::kv_store_impl::KvStoreImpl;
use crate::traits::kv_store::KvStore;

const RETRY_DELAY_MS: u64 = 100;
const MIN_RENEW_MS: u64 = 100;

/// Serializes operations on one application name across workers and nodes
/// sharing the substrate. A held lock is renewed every third of `ttl_secs`;
/// it only expires when its holder dies.
#[derive(Clone)]
pub struct AppLocks {
    store: Arc<KvStoreImpl>,
    ttl_secs: u64,
    max_wait: Duration,
}

pub struct AppLockGuard {
    store: Arc<KvStoreImpl>,
    key: String,
    token: String,
    keepalive: JoinHandle<()>,
    released: bool,
}

impl AppLocks {
    pub fn new(store: Arc<KvStoreImpl>, ttl_secs: u64, max_wait: Duration) -> Self {
        Self {
            store,
            ttl_secs,
            max_wait,
        }
    }

    pub async fn acquire(&self, app: &str) -> AgentResult<AppLockGuard> {
        let key = application_lock_key(app);
        let token = Uuid::new_v4().to_string();
        let started = tokio::time::Instant::now();
        let mut attempt = 0u64;
        loop {
            attempt += 1;
            if self.store.set_nx_ex(&key, &token, self.ttl_secs).await? {
                log::debug!("Lock acquired: {} (attempt {})", key, attempt);
                let keepalive = spawn_keepalive(self.store.clone(), key.clone(), token.clone(), self.ttl_secs);
                return Ok(AppLockGuard {
                    store: self.store.clone(),
                    key,
                    token,
                    keepalive,
                    released: false,
                });
            }
            if started.elapsed() >= self.max_wait {
                return Err(AgentError::LockTimeout(key));
            }
            log::debug!("Lock busy (attempt {}): {}. Retrying...", attempt, key);
            sleep(Duration::from_millis(jittered_delay(RETRY_DELAY_MS))).await;
        }
    }
}

fn spawn_keepalive(store: Arc<KvStoreImpl>, key: String, token: String, ttl_secs: u64) -> JoinHandle<()> {
    let period = Duration::from_millis((ttl_secs.saturating_mul(1000) / 3).max(MIN_RENEW_MS));
    tokio::spawn(async move {
        loop {
            sleep(period).await;
            match store.get(&key).await {
                Ok(Some(holder)) if holder == token => {
                    if let Err(e) = store.expire(&key, ttl_secs).await {
                        log::warn!("Failed to renew lock {}: {}", key, e);
                    }
                }
                Ok(_) => {
                    log::warn!("Lock {} lost while held, renewal stopped", key);
                    break;
                }
                Err(e) => log::warn!("Failed to check lock {}: {}", key, e),
            }
        }
    })
}

async fn delete_if_held(store: &KvStoreImpl, key: &str, token: &str) -> anyhow::Result<()> {
    match store.get(key).await? {
        Some(holder) if holder == token => {
            store.del(key).await?;
            log::debug!("Successfully unlocked lock for key: {}", key);
        }
        _ => log::warn!("Lock {} expired before release", key),
    }
    Ok(())
}

impl AppLockGuard {
    /// Stops renewal and deletes the lock if this guard still owns it.
    pub async fn release(mut self) -> AgentResult<()> {
        self.keepalive.abort();
        self.released = true;
        delete_if_held(&self.store, &self.key, &self.token).await?;
        Ok(())
    }
}

impl Drop for AppLockGuard {
    fn drop(&mut self) {
        self.keepalive.abort();
        if self.released {
            return;
        }
        // dropped without release, e.g. the holding task panicked
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let (store, key, token) = (self.store.clone(), self.key.clone(), self.token.clone());
        runtime.spawn(async move {
            if let Err(e) = delete_if_held(&store, &key, &token).await {
                log::warn!("Failed to release dropped lock {}: {}", key, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::memory_store::MemoryStore;

    #[tokio::test]
    async fn second_holder_waits_for_release() {
        let store = Arc::new(KvStoreImpl::Memory(MemoryStore::new()));
        let locks = AppLocks::new(store, 60, Duration::from_millis(300));
        let guard = locks.acquire("demo").await.unwrap();
        assert!(matches!(
            locks.acquire("demo").await,
            Err(AgentError::LockTimeout(_))
        ));
        // other applications are not affected
        let other = locks.acquire("blog").await.unwrap();
        guard.release().await.unwrap();
        let again = locks.acquire("demo").await.unwrap();
        again.release().await.unwrap();
        other.release().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn held_lock_outlives_its_ttl() {
        let store = Arc::new(KvStoreImpl::Memory(MemoryStore::new()));
        let locks = AppLocks::new(store, 1, Duration::from_millis(300));
        let guard = locks.acquire("demo").await.unwrap();

        sleep(Duration::from_millis(2500)).await;
        assert!(matches!(
            locks.acquire("demo").await,
            Err(AgentError::LockTimeout(_))
        ));

        guard.release().await.unwrap();
        locks.acquire("demo").await.unwrap().release().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_guard_frees_the_lock() {
        let store = Arc::new(KvStoreImpl::Memory(MemoryStore::new()));
        let locks = AppLocks::new(store, 60, Duration::from_secs(2));
        let guard = locks.acquire("demo").await.unwrap();
        drop(guard);
        let again = locks.acquire("demo").await.unwrap();
        again.release().await.unwrap();
    }
}
