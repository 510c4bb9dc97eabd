pub mod application;
pub mod cluster;
pub mod config;
pub mod error;
pub mod keys;
pub mod report;
pub mod task;
pub mod utils;
