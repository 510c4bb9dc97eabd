use rand::{rng, Rng};
use std::collections::HashSet;
use std::sync::Arc;

use crate::common::config::PortsConfig;
use crate::common::error::{AgentError, AgentResult};
use crate::common::keys::ports_key;
use crate::storage::kv_store_impl::KvStoreImpl;
use crate::traits::kv_store::KvStore;

// claims lost to concurrent allocators before giving up
const MAX_CLAIM_ATTEMPTS: usize = 64;
// random samples before falling back to a linear scan of the range
const MAX_SAMPLES: usize = 256;

/// Per-node reservation set of application ports.
///
/// `allocate` is the only safe way to obtain a fresh port under concurrent
/// deploys: the candidate is claimed with a single set-add, so two callers
/// can never both win the same port.
#[derive(Clone)]
pub struct PortRegistry {
    store: Arc<KvStoreImpl>,
    key: String,
    min_port: u16,
    max_port: u16,
}

impl PortRegistry {
    pub fn new(store: Arc<KvStoreImpl>, node: &str, ports: &PortsConfig) -> Self {
        Self {
            store,
            key: ports_key(node),
            min_port: ports.min_port,
            max_port: ports.max_port,
        }
    }

    fn range_len(&self) -> usize {
        usize::from(self.max_port - self.min_port) + 1
    }

    fn check_range(&self, port: u16) -> AgentResult<()> {
        if port < self.min_port || port > self.max_port {
            return Err(AgentError::PortOutOfRange(port));
        }
        Ok(())
    }

    pub async fn reserved(&self) -> AgentResult<HashSet<u16>> {
        let members = self.store.smembers(&self.key).await?;
        Ok(members.iter().filter_map(|m| m.parse().ok()).collect())
    }

    pub async fn is_reserved(&self, port: u16) -> AgentResult<bool> {
        Ok(self.store.sismember(&self.key, &port.to_string()).await?)
    }

    pub async fn reserve(&self, port: u16) -> AgentResult<()> {
        self.check_range(port)?;
        if !self.store.sadd(&self.key, &port.to_string()).await? {
            return Err(AgentError::AlreadyReserved(port));
        }
        log::info!("Reserved port {} ({})", port, self.key);
        Ok(())
    }

    /// Removing a port that is not reserved is a no-op.
    pub async fn release(&self, port: u16) -> AgentResult<()> {
        if self.store.srem(&self.key, &port.to_string()).await? {
            log::info!("Released port {} ({})", port, self.key);
        }
        Ok(())
    }

    /// Picks a port absent from the current set without reserving it.
    pub async fn next(&self) -> AgentResult<u16> {
        let reserved = self.reserved().await?;
        self.pick_free(&reserved)
    }

    fn pick_free(&self, reserved: &HashSet<u16>) -> AgentResult<u16> {
        let in_range = reserved
            .iter()
            .filter(|p| (self.min_port..=self.max_port).contains(*p))
            .count();
        if in_range >= self.range_len() {
            return Err(AgentError::PortExhausted);
        }
        let mut rng = rng();
        for _ in 0..MAX_SAMPLES {
            let port = rng.random_range(self.min_port..=self.max_port);
            if !reserved.contains(&port) {
                return Ok(port);
            }
        }
        // nearly full range, sampling keeps hitting reserved ports
        (self.min_port..=self.max_port)
            .find(|p| !reserved.contains(p))
            .ok_or(AgentError::PortExhausted)
    }

    /// Finds and reserves a free port in one atomic claim.
    pub async fn allocate(&self) -> AgentResult<u16> {
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let port = self.next().await?;
            match self.reserve(port).await {
                Ok(()) => return Ok(port),
                Err(AgentError::AlreadyReserved(_)) => {
                    log::debug!("Port {} claimed concurrently, retrying", port);
                }
                Err(e) => return Err(e),
            }
        }
        Err(AgentError::PortExhausted)
    }
}
