use crate::common::config::{StorageConfig, StorageType};
use crate::storage::kv_store_impl::KvStoreImpl;
use crate::storage::memory::memory_store::MemoryStore;
use crate::storage::redis::redis_client::RedisClient;
use anyhow::Result;

pub async fn load_kv_store(storage: &StorageConfig) -> Result<KvStoreImpl> {
    let store = match storage.store_type {
        StorageType::Memory => {
            log::debug!("Using in-memory store");
            KvStoreImpl::Memory(MemoryStore::new())
        }
        StorageType::Redis => {
            let redis_urls = storage
                .redis_urls
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<String>>();
            if redis_urls.is_empty() {
                return Err(anyhow::anyhow!("Redis store selected but no redis_urls configured"));
            }
            log::debug!("Using Redis store at: {:?}", redis_urls);
            KvStoreImpl::Redis(RedisClient::connect(&redis_urls).await?)
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_is_default() {
        let store = load_kv_store(&StorageConfig::default()).await.unwrap();
        assert!(matches!(store, KvStoreImpl::Memory(_)));
    }

    #[tokio::test]
    async fn redis_without_urls_is_rejected() {
        let storage = StorageConfig {
            store_type: StorageType::Redis,
            redis_urls: " , ".to_string(),
        };
        assert!(load_kv_store(&storage).await.is_err());
    }
}
