//! Domain layer for framelink-server.
//!
//! Plain configuration types with no sockets and no async code.  Populating
//! them from files and command-line flags happens in `main.rs`.

pub mod config;

pub use config::{load_config, ConfigError, DetectorConfig, ServerConfig};
