//! Detector abstraction and the serialized detector worker.
//!
//! Detection models are usually neither thread-safe nor cheap to duplicate,
//! so the server owns exactly one [`Detector`] on a dedicated OS thread.
//! Sessions talk to it through a cloneable [`DetectorHandle`]: each call is a
//! [`DetectRequest`] carrying the frame and a one-shot reply channel, sent
//! over a bounded queue.  Detector calls are therefore strictly one at a time
//! while session network I/O continues concurrently on the Tokio runtime.
//!
//! ```text
//! session A ─┐
//! session B ─┼─ DetectRequest ──▶ [bounded mpsc] ──▶ detector thread
//! session C ─┘                                        │
//!        ◀──────────────── oneshot reply ─────────────┘
//! ```
//!
//! A panic inside `detect` is caught on the worker thread and answered with
//! [`DetectorError::Unusable`] for that request only; the worker keeps
//! serving everyone else.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

use framelink_core::{Detection, Frame};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Errors reported by a [`Detector`] or by the worker that hosts it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectorError {
    /// The detector could not process this particular frame.  The session
    /// answers with an empty detection set and keeps going.
    #[error("detector rejected frame: {0}")]
    Frame(String),

    /// The detector itself is broken; the session must close.
    #[error("detector unusable: {0}")]
    Unusable(String),

    /// The worker thread has exited and no longer accepts requests.
    #[error("detector worker stopped")]
    WorkerStopped,
}

impl DetectorError {
    /// Returns `true` if the error affects only the current frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DetectorError::Frame(_))
    }
}

/// Outcome of one detector call.
pub type DetectResult = Result<Vec<Detection>, DetectorError>;

/// An object detector that maps a decoded frame to a detection set.
///
/// Implementations only need to be `Send`: the worker moves the detector to
/// its own thread and never shares it.
#[cfg_attr(test, mockall::automock)]
pub trait Detector: Send {
    /// Runs detection on one frame.  Detections are returned in model order.
    fn detect(&mut self, frame: &Frame) -> DetectResult;
}

/// One queued detection call.
#[derive(Debug)]
pub struct DetectRequest {
    pub frame: Frame,
    pub reply: oneshot::Sender<DetectResult>,
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Cheap, cloneable client of the detector worker.
#[derive(Debug, Clone)]
pub struct DetectorHandle {
    tx: mpsc::Sender<DetectRequest>,
}

impl DetectorHandle {
    /// Submits `frame` and waits for its detection set.
    ///
    /// Waits for queue space if the worker is saturated.
    ///
    /// # Errors
    ///
    /// Propagates the detector's own [`DetectorError`], or returns
    /// [`DetectorError::WorkerStopped`] if the worker has gone away.
    pub async fn detect(&self, frame: Frame) -> DetectResult {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DetectRequest { frame, reply })
            .await
            .map_err(|_| DetectorError::WorkerStopped)?;
        rx.await.map_err(|_| DetectorError::WorkerStopped)?
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

/// Owner of the detector thread.
///
/// The thread exits once every [`DetectorHandle`] has been dropped and the
/// queue has drained.
#[derive(Debug)]
pub struct DetectorWorker {
    thread: JoinHandle<u64>,
}

impl DetectorWorker {
    /// Moves `detector` onto a new thread and returns the worker plus a handle.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the OS refuses to create the thread.
    pub fn spawn(
        detector: Box<dyn Detector>,
        queue_depth: usize,
    ) -> std::io::Result<(Self, DetectorHandle)> {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let thread = std::thread::Builder::new()
            .name("framelink-detector".to_string())
            .spawn(move || run_worker(detector, rx))?;
        Ok((Self { thread }, DetectorHandle { tx }))
    }

    /// Blocks until the worker thread exits and returns how many requests it
    /// served.
    pub fn join(self) -> u64 {
        self.thread.join().unwrap_or_else(|_| {
            error!("detector worker panicked");
            0
        })
    }
}

fn run_worker(mut detector: Box<dyn Detector>, mut rx: mpsc::Receiver<DetectRequest>) -> u64 {
    info!("detector worker started");
    let mut served = 0u64;
    while let Some(request) = rx.blocking_recv() {
        let result = catch_unwind(AssertUnwindSafe(|| detector.detect(&request.frame)))
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                warn!("detector panicked on frame {}: {reason}", served + 1);
                Err(DetectorError::Unusable(format!("detector panicked: {reason}")))
            });
        served += 1;
        match &result {
            Ok(detections) => debug!("frame {served}: {} detections", detections.len()),
            Err(e) => debug!("frame {served}: {e}"),
        }
        if request.reply.send(result).is_err() {
            debug!("requesting session left before its result was ready");
        }
    }
    info!("detector worker stopped after {served} frames");
    served
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
