//! Infrastructure layer for framelink-server.
//!
//! Owns everything that touches the network or stands in for external
//! systems:
//!
//! - `dispatcher` – TCP listener, per-connection task spawning, session cap,
//!   graceful shutdown
//! - `detectors`  – built-in [`Detector`](crate::application::Detector)
//!   implementations that need no model runtime

pub mod detectors;
pub mod dispatcher;

pub use detectors::{NullDetector, StaticDetector};
pub use dispatcher::{run_server, ActiveSessions, Dispatcher};
