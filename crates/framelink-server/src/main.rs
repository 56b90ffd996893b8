//! FrameLink processing server — entry point.
//!
//! Accepts TCP connections from edge clients, decodes each length-prefixed
//! JPEG frame, runs it through the detector and replies with the detections
//! as a `start … stop` result string.
//!
//! # Usage
//!
//! ```text
//! framelink-server [OPTIONS]
//!
//! Options:
//!   --config       <PATH>  TOML configuration file
//!   --bind         <IP>    Listen address [default from config: 0.0.0.0]
//!   --port         <PORT>  Listen port [default from config: 8080]
//!   --max-sessions <N>     Concurrent session cap [default: unbounded]
//!   --io-timeout   <SECS>  Per-operation transport deadline, 0 disables [default: 30]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable           | Description             |
//! |--------------------|-------------------------|
//! | `FRAMELINK_CONFIG` | Configuration file path |
//! | `FRAMELINK_BIND`   | Listen address          |
//! | `FRAMELINK_PORT`   | Listen port             |
//!
//! Command-line flags override environment variables, which override the
//! configuration file.  `RUST_LOG` overrides the configured log level.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framelink_server::application::{DetectorWorker, MetricsCollector};
use framelink_server::domain::{load_config, ServerConfig};
use framelink_server::infrastructure::{run_server, StaticDetector};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// FrameLink processing server.
///
/// Receives camera frames from edge clients and returns detection results.
#[derive(Debug, Parser)]
#[command(
    name = "framelink-server",
    about = "Receives camera frames over TCP and returns detection results",
    version
)]
struct Cli {
    /// TOML configuration file.  A missing file means built-in defaults.
    #[arg(long, env = "FRAMELINK_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on (`0.0.0.0` for all interfaces).
    #[arg(long, env = "FRAMELINK_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "FRAMELINK_PORT")]
    port: Option<u16>,

    /// Maximum number of concurrent sessions.
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Per-operation transport deadline in seconds; 0 disables it.
    #[arg(long)]
    io_timeout: Option<u64>,
}

impl Cli {
    /// Loads the configuration file (if any) and applies CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if `--bind`
    /// is not an IP address.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(host) = &self.bind {
            config
                .set_bind_host(host)
                .with_context(|| format!("invalid --bind address: '{host}'"))?;
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(max) = self.max_sessions {
            config.max_sessions = Some(max);
        }
        if let Some(secs) = self.io_timeout {
            config.io_timeout_secs = secs;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_server_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "FrameLink server starting — bind={}, max_sessions={:?}, io_timeout={:?}, idle_timeout={:?}",
        config.bind_addr,
        config.max_sessions,
        config.io_timeout(),
        config.idle_timeout()
    );

    // ── Detector worker ───────────────────────────────────────────────────────
    let detector = StaticDetector::new(config.detector.detections.clone());
    let (worker, detector_handle) =
        DetectorWorker::spawn(Box::new(detector), config.detector_queue_depth)
            .context("failed to start detector worker thread")?;

    // ── Metrics ───────────────────────────────────────────────────────────────
    let (collector, metrics_tx, metrics) = MetricsCollector::new();
    let collector_task = tokio::spawn(collector.run());

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ──────────────────────────────────────────────────────
    let accepted = run_server(&config, detector_handle, Some(metrics_tx), running).await?;

    // Every sender and detector handle is gone once the dispatcher returns.
    collector_task.await.context("metrics collector task failed")?;
    let served = tokio::task::spawn_blocking(move || worker.join())
        .await
        .context("detector worker join failed")?;

    let totals = metrics.snapshot();
    info!(
        "FrameLink server stopped — {accepted} connections, {} frames received, {} results sent, {} frames dropped, {served} detector calls",
        totals.frames_received, totals.results_sent, totals.frames_dropped
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_cli() -> Cli {
        Cli {
            config: None,
            bind: None,
            port: None,
            max_sessions: None,
            io_timeout: None,
        }
    }

    #[test]
    fn test_cli_without_flags_leaves_overrides_unset() {
        let cli = Cli::parse_from(["framelink-server"]);
        assert!(cli.max_sessions.is_none());
        assert!(cli.io_timeout.is_none());
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["framelink-server", "--port", "9999"]);
        assert_eq!(cli.port, Some(9999));
    }

    #[test]
    fn test_cli_max_sessions_override() {
        let cli = Cli::parse_from(["framelink-server", "--max-sessions", "3"]);
        assert_eq!(cli.max_sessions, Some(3));
    }

    #[test]
    fn test_into_server_config_defaults() {
        // Arrange
        let cli = bare_cli();

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_into_server_config_applies_bind_and_port() {
        let cli = Cli {
            bind: Some("127.0.0.1".to_string()),
            port: Some(9100),
            ..bare_cli()
        };

        let config = cli.into_server_config().unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9100");
    }

    #[test]
    fn test_into_server_config_applies_limits() {
        let cli = Cli {
            max_sessions: Some(2),
            io_timeout: Some(0),
            ..bare_cli()
        };

        let config = cli.into_server_config().unwrap();

        assert_eq!(config.max_sessions, Some(2));
        assert_eq!(config.io_timeout(), None);
    }

    #[test]
    fn test_into_server_config_invalid_bind_returns_error() {
        let cli = Cli {
            bind: Some("not.an.ip".to_string()),
            ..bare_cli()
        };

        assert!(cli.into_server_config().is_err());
    }

    #[test]
    fn test_cli_flags_override_config_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!("framelink-cli-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "bind_addr = \"127.0.0.1:7000\"\nmax_sessions = 8\n").unwrap();
        let cli = Cli {
            config: Some(path.clone()),
            port: Some(7001),
            ..bare_cli()
        };

        // Act
        let config = cli.into_server_config().unwrap();
        std::fs::remove_file(&path).ok();

        // Assert
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:7001");
        assert_eq!(config.max_sessions, Some(8));
    }
}
