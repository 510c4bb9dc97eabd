pub mod context;
pub mod deploy;
pub mod remove;
pub mod restart;
pub mod scale;
pub mod stop;
