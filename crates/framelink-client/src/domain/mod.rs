//! Domain layer for framelink-client: configuration and overlay types.

pub mod annotation;
pub mod config;

pub use annotation::Annotation;
pub use config::{load_config, CameraConfig, ClientConfig, ConfigError};
