//! framelink-client library crate.
//!
//! Streams camera frames to a FrameLink server one at a time and overlays
//! the returned detections, each labelled with the distance measured at the
//! centre of its box.
//!
//! # Architecture
//!
//! ```text
//! infrastructure::camera ──▶ application::client_loop ──TCP──▶ server
//!   (DeviceGuard)                 │          ▲
//!                                 │          └─ start … stop result
//!                                 ▼
//!                      application::annotate ──▶ infrastructure::annotator
//! ```
//!
//! The loop is generic over the stream, the frame source and the annotator,
//! so unit tests drive it with scripted I/O and mocks.

/// Domain layer: configuration and annotation types.
pub mod domain;

/// Application layer: the client loop and device interfaces.
pub mod application;

/// Infrastructure layer: TCP connection, synthetic camera, log annotator.
pub mod infrastructure;
