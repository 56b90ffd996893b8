//! One client connection, from first frame to close.
//!
//! A session is a loop over an explicit state machine:
//!
//! ```text
//! AwaitFrame ─▶ Decode ─▶ Detect ─▶ EncodeResult ─▶ SendResult ─┐
//!     ▲           │                                             │
//!     │           └─ undecodable image: frame dropped ──────────┤
//!     └─────────────────────────────────────────────────────────┘
//!
//! any state ─▶ Closed   (peer hang-up, transport failure, broken detector)
//! ```
//!
//! The session owns its socket and its [`SessionStats`].  The only state it
//! shares is the detector queue and the metrics channel.

use std::fmt;

use framelink_core::{decode_frame, encode_detections, Detection, Frame, FramedStream};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::detector::DetectorHandle;
use crate::application::metrics::{MetricsEvent, SessionStats};

/// Where a session is in its per-frame cycle.
#[derive(Debug, PartialEq)]
pub enum SessionState {
    AwaitFrame,
    Decode(Vec<u8>),
    Detect(Frame),
    EncodeResult(Vec<Detection>),
    SendResult(String),
    Closed(CloseReason),
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed the stream between frames.
    PeerClosed,
    /// Reading or writing the socket failed (including deadline expiry).
    Transport(String),
    /// The detector reported itself unusable or its worker stopped.
    Detector(String),
}

impl CloseReason {
    /// Returns `true` for an orderly close initiated by the peer.
    pub fn is_clean(&self) -> bool {
        matches!(self, CloseReason::PeerClosed)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed the connection"),
            CloseReason::Transport(e) => write!(f, "transport failure: {e}"),
            CloseReason::Detector(e) => write!(f, "detector failure: {e}"),
        }
    }
}

/// Everything a session needs besides its socket.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: Uuid,
    /// Peer description used in logs (usually the socket address).
    pub peer: String,
    pub detector: DetectorHandle,
    pub metrics: Option<UnboundedSender<MetricsEvent>>,
}

impl SessionContext {
    /// Creates a context with a fresh session id and no metrics channel.
    pub fn new(peer: impl Into<String>, detector: DetectorHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer: peer.into(),
            detector,
            metrics: None,
        }
    }

    /// Reports session events on `metrics`.
    pub fn with_metrics(mut self, metrics: UnboundedSender<MetricsEvent>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn report(&self, event: MetricsEvent) {
        if let Some(tx) = &self.metrics {
            // The collector may already be gone during shutdown.
            let _ = tx.send(event);
        }
    }
}

/// Summary returned when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub id: Uuid,
    pub peer: String,
    pub reason: CloseReason,
    pub stats: SessionStats,
}

/// Drives one connection until it closes.
///
/// Never returns an error: every failure is classified into a
/// [`CloseReason`], logged, and carried in the returned report.
pub async fn run_session<S>(mut stream: FramedStream<S>, ctx: SessionContext) -> SessionReport
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = ctx.id;
    info!(session = %id, peer = %ctx.peer, "session started");
    ctx.report(MetricsEvent::SessionOpened { id });

    let mut stats = SessionStats::default();
    let mut state = SessionState::AwaitFrame;
    let reason = loop {
        state = match state {
            SessionState::Closed(reason) => break reason,
            other => step(other, &mut stream, &ctx, &mut stats).await,
        };
    };

    stats.bytes_in = stream.bytes_read();
    stats.bytes_out = stream.bytes_written();
    if reason.is_clean() {
        info!(session = %id, peer = %ctx.peer, frames = stats.frames_received, "session closed: {reason}");
    } else {
        warn!(session = %id, peer = %ctx.peer, frames = stats.frames_received, "session closing: {reason}");
    }
    if let Err(e) = stream.shutdown().await {
        debug!(session = %id, "socket shutdown failed: {e}");
    }
    ctx.report(MetricsEvent::SessionClosed {
        id,
        stats,
        clean: reason.is_clean(),
    });

    SessionReport {
        id,
        peer: ctx.peer,
        reason,
        stats,
    }
}

/// Performs one state transition.
async fn step<S>(
    state: SessionState,
    stream: &mut FramedStream<S>,
    ctx: &SessionContext,
    stats: &mut SessionStats,
) -> SessionState
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match state {
        SessionState::AwaitFrame => match stream.recv_framed().await {
            Ok(Some(payload)) => {
                stats.frames_received += 1;
                SessionState::Decode(payload)
            }
            Ok(None) => SessionState::Closed(CloseReason::PeerClosed),
            Err(e) => SessionState::Closed(CloseReason::Transport(e.to_string())),
        },

        SessionState::Decode(payload) => match decode_frame(&payload) {
            Ok(frame) => {
                debug!(session = %ctx.id, "frame {}: {}x{}", stats.frames_received, frame.width, frame.height);
                SessionState::Detect(frame)
            }
            Err(e) => {
                warn!(session = %ctx.id, "dropping frame {} ({} bytes): {e}", stats.frames_received, payload.len());
                stats.frames_dropped += 1;
                SessionState::AwaitFrame
            }
        },

        SessionState::Detect(frame) => match ctx.detector.detect(frame).await {
            Ok(detections) => SessionState::EncodeResult(detections),
            Err(e) if e.is_recoverable() => {
                warn!(session = %ctx.id, "frame {}: {e}; replying with no detections", stats.frames_received);
                stats.detector_failures += 1;
                SessionState::EncodeResult(Vec::new())
            }
            Err(e) => SessionState::Closed(CloseReason::Detector(e.to_string())),
        },

        SessionState::EncodeResult(detections) => {
            stats.detections_sent += detections.len() as u64;
            SessionState::SendResult(encode_detections(&detections))
        }

        SessionState::SendResult(text) => match stream.send_framed(text.as_bytes()).await {
            Ok(()) => {
                stats.results_sent += 1;
                SessionState::AwaitFrame
            }
            Err(e) => SessionState::Closed(CloseReason::Transport(e.to_string())),
        },

        closed @ SessionState::Closed(_) => closed,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
