//! Client configuration.
//!
//! Same pattern as the server: a TOML file with serde defaults for every
//! field, then command-line overrides applied in `main.rs`.
//!
//! ```toml
//! server_addr = "192.168.1.20:8080"
//! jpeg_quality = 80
//! max_frames = 300
//!
//! [camera]
//! width = 1280
//! height = 720
//! depth_m = 3.5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use framelink_core::DEFAULT_JPEG_QUALITY;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The server address is not in `host:port` form.
    #[error("invalid address `{0}`: expected host:port")]
    InvalidAddress(String),
}

/// All runtime settings for the edge client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Server to stream to, as `host:port`.  Host names are resolved.
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Deadline for each send and each result read; `0` disables it.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// JPEG quality, 1–100.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Stop after this many frames.  Unset means run until interrupted.
    #[serde(default)]
    pub max_frames: Option<u64>,
    /// Pause before retrying when the camera has no frame ready.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub camera: CameraConfig,
}

/// Settings for the built-in synthetic camera.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// 3 for RGB, 4 to emulate sensors that deliver an extra alpha channel.
    #[serde(default = "default_channels")]
    pub channels: u8,
    #[serde(default)]
    pub color: [u8; 3],
    /// Distance of the simulated flat scene in metres.
    #[serde(default = "default_depth_m")]
    pub depth_m: f32,
    /// Report every depth sample as missing.
    #[serde(default)]
    pub invalid_depth: bool,
    /// Minimum time between frames; `0` delivers frames back to back.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_server_addr() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_io_timeout_secs() -> u64 {
    10
}
fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}
fn default_idle_backoff_ms() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_channels() -> u8 {
    3
}
fn default_depth_m() -> f32 {
    2.0
}
fn default_frame_interval_ms() -> u64 {
    33
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            connect_timeout_secs: default_connect_timeout_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            jpeg_quality: default_jpeg_quality(),
            max_frames: None,
            idle_backoff_ms: default_idle_backoff_ms(),
            log_level: default_log_level(),
            camera: CameraConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            channels: default_channels(),
            color: [0, 0, 0],
            depth_m: default_depth_m(),
            invalid_depth: false,
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl ClientConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-operation transport deadline, or `None` when disabled.
    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_secs > 0).then(|| Duration::from_secs(self.io_timeout_secs))
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// Checks that `server_addr` looks like `host:port` with a numeric port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] otherwise.
    pub fn validate_server_addr(&self) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidAddress(self.server_addr.clone());
        let (host, port) = self.server_addr.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(invalid());
        }
        Ok(())
    }
}

/// Loads a [`ClientConfig`] from `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => ClientConfig::from_toml_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
