//! Server configuration.
//!
//! [`ServerConfig`] is read from an optional TOML file and then overridden by
//! command-line flags (see `main.rs`).  Every field has a serde default, so a
//! partial file, or no file at all, yields a working configuration.
//!
//! ```toml
//! bind_addr = "0.0.0.0:8080"
//! io_timeout_secs = 30
//! max_sessions = 8
//!
//! [[detector.detections]]
//! label = 0
//! confidence = 0.87
//! bbox = { x1 = 10, y1 = 20, x2 = 50, y2 = 60 }
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use framelink_core::protocol::framing::DEFAULT_MAX_FRAME_LEN;
use framelink_core::Detection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A host/port pair does not form a valid socket address.
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// All runtime settings for the processing server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Address the dispatcher listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Deadline for each send and for each payload read; `0` disables it.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// How long a session may wait for the client's next frame.  Unset means
    /// idle clients are never dropped.
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
    /// Maximum concurrent sessions.  Unset means unbounded.
    #[serde(default)]
    pub max_sessions: Option<usize>,
    /// Largest accepted frame payload in bytes.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: u32,
    /// Number of detection requests that may queue for the detector worker.
    #[serde(default = "default_detector_queue_depth")]
    pub detector_queue_depth: usize,
    /// How long shutdown waits for in-flight sessions before aborting them.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub detector: DetectorConfig,
}

/// Settings for the built-in static detector.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectorConfig {
    /// Detections returned for every frame; empty by default.
    #[serde(default)]
    pub detections: Vec<Detection>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_io_timeout_secs() -> u64 {
    30
}
fn default_max_frame_len() -> u32 {
    DEFAULT_MAX_FRAME_LEN
}
fn default_detector_queue_depth() -> usize {
    32
}
fn default_shutdown_grace_secs() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            io_timeout_secs: default_io_timeout_secs(),
            idle_timeout_secs: None,
            max_sessions: None,
            max_frame_len: default_max_frame_len(),
            detector_queue_depth: default_detector_queue_depth(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            log_level: default_log_level(),
            detector: DetectorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Per-operation transport deadline, or `None` when disabled.
    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_secs > 0).then(|| Duration::from_secs(self.io_timeout_secs))
    }

    /// Deadline for a session waiting on the next frame.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Replaces the host part of `bind_addr`, keeping the port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `host` is not an IP address.
    pub fn set_bind_host(&mut self, host: &str) -> Result<(), ConfigError> {
        let ip: IpAddr = host
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(host.to_string()))?;
        self.bind_addr.set_ip(ip);
        Ok(())
    }
}

/// Loads a [`ServerConfig`] from `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => ServerConfig::from_toml_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
