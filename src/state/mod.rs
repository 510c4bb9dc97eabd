pub mod app_locks;
pub mod config_store;
pub mod node_directory;
pub mod port_registry;
pub mod task_queue;
