//! FrameLink edge client — entry point.
//!
//! Captures frames from the synthetic camera, streams them to the server and
//! logs each returned detection with its distance.
//!
//! # Usage
//!
//! ```text
//! framelink-client [OPTIONS]
//!
//! Options:
//!   --config       <PATH>       TOML configuration file
//!   --server       <HOST:PORT>  Server address [default: 127.0.0.1:8080]
//!   --max-frames   <N>          Stop after N frames [default: run until Ctrl+C]
//!   --jpeg-quality <1-100>      JPEG quality [default: 90]
//!   --io-timeout   <SECS>       Per-operation transport deadline, 0 disables [default: 10]
//! ```
//!
//! `FRAMELINK_CONFIG` and `FRAMELINK_SERVER` may be used instead of the
//! corresponding flags.  `RUST_LOG` overrides the configured log level.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framelink_client::application::{run_client_loop, DeviceGuard, LoopSettings};
use framelink_client::domain::{load_config, ClientConfig};
use framelink_client::infrastructure::{connect, LogAnnotator, SyntheticCamera};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// FrameLink edge client.
#[derive(Debug, Parser)]
#[command(
    name = "framelink-client",
    about = "Streams camera frames to a FrameLink server and overlays detections",
    version
)]
struct Cli {
    /// TOML configuration file.  A missing file means built-in defaults.
    #[arg(long, env = "FRAMELINK_CONFIG")]
    config: Option<PathBuf>,

    /// Server address as host:port.
    #[arg(long, env = "FRAMELINK_SERVER")]
    server: Option<String>,

    /// Stop after sending this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// JPEG quality for outgoing frames.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: Option<u8>,

    /// Per-operation transport deadline in seconds; 0 disables it.
    #[arg(long)]
    io_timeout: Option<u64>,
}

impl Cli {
    /// Loads the configuration file (if any) and applies CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting server address is not `host:port`.
    fn into_client_config(self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ClientConfig::default(),
        };

        if let Some(server) = self.server {
            config.server_addr = server;
        }
        if let Some(max) = self.max_frames {
            config.max_frames = Some(max);
        }
        if let Some(quality) = self.jpeg_quality {
            config.jpeg_quality = quality;
        }
        if let Some(secs) = self.io_timeout {
            config.io_timeout_secs = secs;
        }
        config.validate_server_addr()?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_client_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "FrameLink client starting — server={}, quality={}, max_frames={:?}",
        config.server_addr, config.jpeg_quality, config.max_frames
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — stopping after the current frame");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // The guard closes the camera on every exit path below.
    let mut camera = DeviceGuard::open(SyntheticCamera::new(config.camera.clone()))
        .context("failed to open capture device")?;
    let stream = connect(&config.server_addr, config.connect_timeout(), config.io_timeout())
        .await
        .with_context(|| format!("failed to connect to {}", config.server_addr))?;

    let settings = LoopSettings {
        jpeg_quality: config.jpeg_quality,
        max_frames: config.max_frames,
        idle_backoff: config.idle_backoff(),
    };
    let mut annotator = LogAnnotator::new();
    let summary = run_client_loop(stream, &mut camera, &mut annotator, &settings, &running)
        .await
        .context("client run aborted")?;

    info!(
        "FrameLink client stopped — {} frames sent, {} annotated, {} without detections, {} malformed results, mean latency {:?}",
        summary.frames_sent,
        summary.frames_annotated,
        summary.frames_without_detections,
        summary.malformed_results,
        summary.mean_latency()
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
