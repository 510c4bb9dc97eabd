use crate::traits::kv_store::UnsendKvStore;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{AsyncCommands, ExistenceCheck, SetExpiry, SetOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

// Runs `$body` against whichever shared connection this client holds.
macro_rules! with_conn {
    ($self:ident, $conn:ident => $body:expr) => {{
        if $self.cluster {
            if let Some(shared) = &$self.cluster_conn {
                let mut $conn = shared.lock().await;
                return $body;
            }
        } else if let Some(shared) = &$self.single_conn {
            let mut $conn = shared.lock().await;
            return $body;
        }
        Err(anyhow::anyhow!("redis connection not initialised"))
    }};
}

#[derive(Clone)]
pub struct RedisClient {
    cluster: bool,
    cluster_client: Option<ClusterClient>,
    cluster_conn: Option<Arc<Mutex<ClusterConnection>>>,
    single_conn: Option<Arc<Mutex<MultiplexedConnection>>>,
    // first configured node; used for blocking pops and pub/sub
    client: redis::Client,
}

impl RedisClient {
    pub async fn connect(redis_urls: &[String]) -> anyhow::Result<Self> {
        let first = redis_urls
            .first()
            .ok_or_else(|| anyhow::anyhow!("no redis url configured"))?;
        let client = redis::Client::open(first.as_str())?;
        if redis_urls.len() > 1 {
            log::debug!("Using Redis Cluster with URLs: {:?}", redis_urls);
            let cluster_client = ClusterClient::new(redis_urls.to_vec())?;
            let conn = cluster_client.get_async_connection().await?;
            Ok(Self {
                cluster: true,
                cluster_client: Some(cluster_client),
                cluster_conn: Some(Arc::new(Mutex::new(conn))),
                single_conn: None,
                client,
            })
        } else {
            log::debug!("Using single Redis instance at: {}", first);
            let conn = client.get_multiplexed_async_connection().await?;
            Ok(Self {
                cluster: false,
                cluster_client: None,
                cluster_conn: None,
                single_conn: Some(Arc::new(Mutex::new(conn))),
                client,
            })
        }
    }
}

impl UnsendKvStore for RedisClient {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        with_conn!(self, conn => {
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        with_conn!(self, conn => {
            let _: () = conn.set(key, value).await?;
            Ok(())
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        with_conn!(self, conn => {
            let _: () = conn.set_ex(key, value, ttl_secs).await?;
            Ok(())
        })
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<bool> {
        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::NX)
            .with_expiration(SetExpiry::EX(ttl_secs.try_into()?));
        with_conn!(self, conn => {
            let result: Option<String> = conn.set_options(key, value, options).await?;
            Ok(result.is_some())
        })
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> anyhow::Result<()> {
        with_conn!(self, conn => {
            let _: () = conn.expire(key, ttl_secs as i64).await?;
            Ok(())
        })
    }

    async fn del(&self, key: &str) -> anyhow::Result<usize> {
        with_conn!(self, conn => {
            let removed: usize = conn.del(key).await?;
            Ok(removed)
        })
    }

    async fn keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        with_conn!(self, conn => {
            let keys: Vec<String> = conn.keys(pattern).await?;
            Ok(keys)
        })
    }

    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<bool> {
        with_conn!(self, conn => {
            let added: usize = conn.sadd(key, member).await?;
            Ok(added == 1)
        })
    }

    async fn srem(&self, key: &str, member: &str) -> anyhow::Result<bool> {
        with_conn!(self, conn => {
            let removed: usize = conn.srem(key, member).await?;
            Ok(removed == 1)
        })
    }

    async fn sismember(&self, key: &str, member: &str) -> anyhow::Result<bool> {
        with_conn!(self, conn => {
            let present: bool = conn.sismember(key, member).await?;
            Ok(present)
        })
    }

    async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>> {
        with_conn!(self, conn => {
            let members: Vec<String> = conn.smembers(key).await?;
            Ok(members)
        })
    }

    async fn rpush(&self, key: &str, value: &str) -> anyhow::Result<()> {
        with_conn!(self, conn => {
            let _: usize = conn.rpush(key, value).await?;
            Ok(())
        })
    }

    async fn blpop(&self, key: &str, timeout: Duration) -> anyhow::Result<Option<String>> {
        // a blocking pop would stall every other caller of the shared connection
        let popped: Option<(String, String)> = match &self.cluster_client {
            Some(cluster_client) if self.cluster => {
                let mut conn = cluster_client.get_async_connection().await?;
                conn.blpop(key, timeout.as_secs_f64()).await?
            }
            _ => {
                let mut conn = self.client.get_multiplexed_async_connection().await?;
                conn.blpop(key, timeout.as_secs_f64()).await?
            }
        };
        Ok(popped.map(|(_, value)| value))
    }

    async fn lrange_all(&self, key: &str) -> anyhow::Result<Vec<String>> {
        with_conn!(self, conn => {
            let values: Vec<String> = conn.lrange(key, 0, -1).await?;
            Ok(values)
        })
    }

    async fn lrem(&self, key: &str, value: &str) -> anyhow::Result<usize> {
        with_conn!(self, conn => {
            let removed: usize = conn.lrem(key, 0, value).await?;
            Ok(removed)
        })
    }

    async fn publish(&self, channel: &str, message: &str) -> anyhow::Result<()> {
        with_conn!(self, conn => {
            let _: usize = conn.publish(channel, message).await?;
            Ok(())
        })
    }

    async fn subscribe(&self, channel: &str) -> anyhow::Result<mpsc::Receiver<String>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        let (tx, rx) = mpsc::channel(256);
        let channel = channel.to_string();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        log::warn!("Undecodable message on {}: {}", channel, e);
                        continue;
                    }
                };
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
            log::debug!("Subscription to {} closed", channel);
        });
        Ok(rx)
    }
}
