//! Logging setup shared by the gateway binaries

pub mod config;
pub mod init;

pub use config::{InstrumentationConfig, LogFormat};
pub use init::{env_filter, init_default, init_tracing};
