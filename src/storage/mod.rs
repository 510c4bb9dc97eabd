pub mod memory {
    pub mod memory_store;
}
pub mod redis {
    pub mod redis_client;
}
pub mod kv_store_impl;
