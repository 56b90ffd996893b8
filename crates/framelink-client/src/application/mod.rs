//! Application layer for framelink-client.
//!
//! - `client_loop` – acquire → send → receive → annotate, one frame at a time
//! - `device`      – the capture-device and overlay interfaces
//! - `annotate`    – pairs detections with depth-derived distances

pub mod annotate;
pub mod client_loop;
pub mod device;

pub use annotate::annotate_detections;
pub use client_loop::{run_client_loop, ClientError, ClientState, LoopSettings, RunSummary};
pub use device::{Annotator, CaptureDevice, DeviceError, DeviceGuard, FrameSource};
