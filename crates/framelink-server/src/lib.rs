//! framelink-server library crate.
//!
//! Receives length-prefixed JPEG frames from edge clients, runs them through
//! a detector, and answers each frame with a `start … stop` result string.
//!
//! # Architecture
//!
//! ```text
//! edge client ──TCP──▶ infrastructure::dispatcher   accept loop, session cap
//!                          │ one task per connection
//!                          ▼
//!                      application::session          frame → result loop
//!                          │ DetectRequest / oneshot reply
//!                          ▼
//!                      application::detector         single worker thread
//!
//! application::metrics  ◀── SessionClosed events from every session
//! domain::config        ServerConfig (TOML + CLI)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async code.
//! - `application` depends on `domain` and `framelink-core`; sessions are
//!   generic over any `AsyncRead + AsyncWrite` stream.
//! - `infrastructure` binds sockets and spawns tasks.

/// Domain layer: configuration types.
pub mod domain;

/// Application layer: sessions, detector worker, metrics.
pub mod application;

/// Infrastructure layer: TCP dispatcher and built-in detectors.
pub mod infrastructure;
