use crate::common::utils::glob_match;
use crate::traits::kv_store::UnsendKvStore;
use anyhow::Result;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use tokio::time::Instant;

#[derive(Default)]
struct Inner {
    strings: HashMap<String, (String, Option<Instant>)>,
    sets: HashMap<String, BTreeSet<String>>,
    lists: HashMap<String, VecDeque<String>>,
    channels: HashMap<String, broadcast::Sender<String>>,
}

impl Inner {
    fn live_string(&mut self, key: &str) -> Option<&String> {
        let expired = matches!(self.strings.get(key), Some((_, Some(at))) if *at <= Instant::now());
        if expired {
            self.strings.remove(key);
        }
        self.strings.get(key).map(|(v, _)| v)
    }

    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.strings
            .retain(|_, (_, expires)| expires.is_none_or(|at| at > now));
    }
}

/// In-process substrate for single-node setups and tests.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    pushed: Notify,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            pushed: Notify::new(),
        }
    }
}

fn deadline(ttl_secs: u64) -> Option<Instant> {
    Some(Instant::now() + Duration::from_secs(ttl_secs))
}

impl UnsendKvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.live_string(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.strings.insert(key.to_string(), (value.to_string(), None));
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .strings
            .insert(key.to_string(), (value.to_string(), deadline(ttl_secs)));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.live_string(key).is_some() {
            return Ok(false);
        }
        inner
            .strings
            .insert(key.to_string(), (value.to_string(), deadline(ttl_secs)));
        Ok(true)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some((_, expires)) = inner.strings.get_mut(key) {
            *expires = deadline(ttl_secs);
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let mut removed = 0;
        if inner.live_string(key).is_some() {
            removed += 1;
        }
        inner.strings.remove(key);
        if inner.sets.remove(key).is_some() {
            removed += 1;
        }
        if inner.lists.remove(key).is_some() {
            removed += 1;
        }
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut inner = self.inner.lock().await;
        inner.purge_expired();
        let mut keys: Vec<String> = inner
            .strings
            .keys()
            .chain(inner.sets.keys())
            .chain(inner.lists.keys())
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(set) = inner.sets.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(member);
        if set.is_empty() {
            inner.sets.remove(key);
        }
        Ok(removed)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.sets.get(key).is_some_and(|s| s.contains(member)))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            inner
                .lists
                .entry(key.to_string())
                .or_default()
                .push_back(value.to_string());
        }
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn blpop(&self, key: &str, timeout: Duration) -> Result<Option<String>> {
        let until = Instant::now() + timeout;
        loop {
            // registered before the check so a push in between is not missed
            let notified = self.pushed.notified();
            {
                let mut inner = self.inner.lock().await;
                if let Some(list) = inner.lists.get_mut(key) {
                    let value = list.pop_front();
                    if list.is_empty() {
                        inner.lists.remove(key);
                    }
                    if value.is_some() {
                        return Ok(value);
                    }
                }
            }
            if tokio::time::timeout_at(until, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn lrange_all(&self, key: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .lists
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn lrem(&self, key: &str, value: &str) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let Some(list) = inner.lists.get_mut(key) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|v| v != value);
        let removed = before - list.len();
        if list.is_empty() {
            inner.lists.remove(key);
        }
        Ok(removed)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let inner = self.inner.lock().await;
        if let Some(sender) = inner.channels.get(channel) {
            // no subscribers is not an error for pub/sub
            let _ = sender.send(message.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>> {
        let mut source = {
            let mut inner = self.inner.lock().await;
            inner
                .channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(256).0)
                .subscribe()
        };
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("subscriber lagged, {} messages dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(rx)
    }
}
