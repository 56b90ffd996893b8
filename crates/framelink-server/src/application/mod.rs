//! Application layer for framelink-server.
//!
//! - `session`  – the per-connection frame → detections → result loop
//! - `detector` – the [`Detector`] trait and its serialized worker thread
//! - `metrics`  – per-session counters and their server-wide aggregation
//!
//! Nothing here binds sockets or spawns connection tasks; that is the
//! infrastructure layer's job.  Sessions are generic over any async stream,
//! so they are tested over in-memory pipes.

pub mod detector;
pub mod metrics;
pub mod session;

pub use detector::{DetectRequest, DetectResult, Detector, DetectorError, DetectorHandle, DetectorWorker};
pub use metrics::{MetricsCollector, MetricsEvent, MetricsHandle, ServerMetrics, SessionStats};
pub use session::{run_session, CloseReason, SessionContext, SessionReport, SessionState};
