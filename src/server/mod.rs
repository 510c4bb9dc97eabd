pub mod bootstrap;
pub mod cluster_heartbeat;
pub mod dispatch;
pub mod listener;
pub mod loader;
pub mod server;
pub mod worker;
