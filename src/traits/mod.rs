pub mod kv_store;
pub mod process_runner;
