#![allow(clippy::async_fn_in_trait)]
pub mod common;
pub mod handler;
pub mod provision;
pub mod server;
pub mod state;
pub mod storage;
pub mod traits;

pub use server::server::agent_start;
