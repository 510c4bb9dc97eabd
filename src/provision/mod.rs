pub mod environment;
pub mod package;
pub mod process;
pub mod source;
pub mod supervisor;
pub mod templates;
