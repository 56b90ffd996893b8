//! The edge client's request/response loop over one connection.
//!
//! ```text
//! Acquire ─▶ Send ─▶ Recv ─▶ DecodeResult ─▶ Annotate ─┐
//!    ▲                           │                     │
//!    │                           └─ empty / malformed ─┤
//!    └─────────────────────────────────────────────────┘
//!
//! Acquire ─▶ Stopped   (stop requested, frame budget reached)
//! ```
//!
//! Exactly one frame is in flight at a time: the next frame is acquired only
//! after the previous result has arrived.  Transport failures and a server
//! hang-up end the run; a result that cannot be parsed only skips the
//! overlay for its frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use framelink_core::{
    decode_result_payload, encode_frame, Detection, Frame, FramedStream, TransportError,
    DEFAULT_JPEG_QUALITY,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::application::annotate::annotate_detections;
use crate::application::device::{Annotator, DeviceError, FrameSource};

/// Error type for a client run.  Every variant ends the run.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("capture device failure: {0}")]
    Device(#[from] DeviceError),

    /// The server closed the stream while a result was outstanding.
    #[error("server closed the connection before replying")]
    ServerClosed,
}

/// Where the loop is in its per-frame cycle.
#[derive(Debug)]
pub enum ClientState {
    Acquire,
    Send(Frame),
    /// Waiting for the result of the frame sent at the given instant.
    Recv(Frame, Instant),
    DecodeResult(Frame, Vec<u8>),
    Annotate(Frame, Vec<Detection>),
    Stopped,
}

/// Knobs for [`run_client_loop`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub jpeg_quality: u8,
    /// Stop after sending this many frames.
    pub max_frames: Option<u64>,
    /// Pause after the device reports no frame ready or a failed grab.
    pub idle_backoff: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_frames: None,
            idle_backoff: Duration::from_millis(10),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub frames_sent: u64,
    pub results_received: u64,
    pub frames_annotated: u64,
    /// Results that were empty or carried an empty detection set.
    pub frames_without_detections: u64,
    /// Results rejected by the grammar parser.
    pub malformed_results: u64,
    /// Frames the encoder refused; they are never sent.
    pub encode_failures: u64,
    pub grab_failures: u64,
    /// Sum of send-to-result latencies.
    pub total_round_trip: Duration,
}

impl RunSummary {
    /// Average send-to-result latency, or `None` before the first result.
    pub fn mean_latency(&self) -> Option<Duration> {
        let n = u32::try_from(self.results_received).ok()?;
        self.total_round_trip.checked_div(n)
    }

    fn budget_spent(&self, max_frames: Option<u64>) -> bool {
        max_frames.is_some_and(|max| self.frames_sent >= max)
    }
}

/// Streams frames from `source` over `stream` until stopped.
///
/// The loop checks `running` before every acquisition and stops once it is
/// cleared or once `settings.max_frames` frames have been answered.  The
/// socket's write side is shut down on every exit path.
///
/// # Errors
///
/// Returns [`ClientError`] on a transport failure, a server hang-up while a
/// result is pending, or a fatal device error.
pub async fn run_client_loop<S, F, A>(
    mut stream: FramedStream<S>,
    source: &mut F,
    annotator: &mut A,
    settings: &LoopSettings,
    running: &AtomicBool,
) -> Result<RunSummary, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FrameSource + ?Sized,
    A: Annotator + ?Sized,
{
    info!(
        "client loop started — quality={}, max_frames={:?}",
        settings.jpeg_quality, settings.max_frames
    );

    let mut summary = RunSummary::default();
    let mut state = ClientState::Acquire;
    let outcome = loop {
        state = match state {
            ClientState::Stopped => break Ok(()),
            other => match step(other, &mut stream, source, annotator, settings, running, &mut summary).await {
                Ok(next) => next,
                Err(e) => break Err(e),
            },
        };
    };

    if let Err(e) = stream.shutdown().await {
        debug!("socket shutdown failed: {e}");
    }

    match outcome {
        Ok(()) => {
            info!(
                "client loop stopped — {} frames sent, {} annotated, mean latency {:?}",
                summary.frames_sent,
                summary.frames_annotated,
                summary.mean_latency()
            );
            Ok(summary)
        }
        Err(e) => {
            warn!("client loop aborted after {} frames: {e}", summary.frames_sent);
            Err(e)
        }
    }
}

/// Performs one state transition.
async fn step<S, F, A>(
    state: ClientState,
    stream: &mut FramedStream<S>,
    source: &mut F,
    annotator: &mut A,
    settings: &LoopSettings,
    running: &AtomicBool,
    summary: &mut RunSummary,
) -> Result<ClientState, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FrameSource + ?Sized,
    A: Annotator + ?Sized,
{
    let next = match state {
        ClientState::Acquire => {
            if !running.load(Ordering::Relaxed) || summary.budget_spent(settings.max_frames) {
                return Ok(ClientState::Stopped);
            }
            match source.acquire_frame() {
                Ok(Some(frame)) => ClientState::Send(frame),
                Ok(None) => {
                    tokio::time::sleep(settings.idle_backoff).await;
                    ClientState::Acquire
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("{e}; retrying");
                    summary.grab_failures += 1;
                    tokio::time::sleep(settings.idle_backoff).await;
                    ClientState::Acquire
                }
            }
        }

        ClientState::Send(frame) => match encode_frame(&frame, settings.jpeg_quality) {
            Ok(jpeg) => {
                stream.send_framed(&jpeg).await?;
                summary.frames_sent += 1;
                debug!("frame {} sent ({} bytes)", summary.frames_sent, jpeg.len());
                ClientState::Recv(frame, Instant::now())
            }
            Err(e) => {
                warn!("skipping frame: {e}");
                summary.encode_failures += 1;
                ClientState::Acquire
            }
        },

        ClientState::Recv(frame, sent_at) => match stream.recv_framed().await? {
            Some(payload) => {
                summary.results_received += 1;
                summary.total_round_trip += sent_at.elapsed();
                ClientState::DecodeResult(frame, payload)
            }
            None => return Err(ClientError::ServerClosed),
        },

        ClientState::DecodeResult(frame, payload) => {
            if payload.is_empty() {
                summary.frames_without_detections += 1;
                return Ok(ClientState::Acquire);
            }
            match decode_result_payload(&payload) {
                Ok(detections) if detections.is_empty() => {
                    summary.frames_without_detections += 1;
                    ClientState::Acquire
                }
                Ok(detections) => ClientState::Annotate(frame, detections),
                Err(e) => {
                    warn!("frame {}: ignoring result: {e}", summary.frames_sent);
                    summary.malformed_results += 1;
                    ClientState::Acquire
                }
            }
        }

        ClientState::Annotate(frame, detections) => {
            let annotations = annotate_detections(&*source, &detections);
            annotator.annotate(&frame, &annotations);
            summary.frames_annotated += 1;
            ClientState::Acquire
        }

        ClientState::Stopped => ClientState::Stopped,
    };
    Ok(next)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::device::{MockAnnotator, MockFrameSource};
    use framelink_core::{BoundingBox, Point3D};
    use tokio::io::duplex;
    use tokio_test::io::Builder;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut bytes = (payload.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    fn black() -> Frame {
        Frame::solid(100, 100, [0, 0, 0])
    }

    fn one_frame() -> LoopSettings {
        LoopSettings {
            max_frames: Some(1),
            idle_backoff: Duration::ZERO,
            ..LoopSettings::default()
        }
    }

    fn source_of(frame: Frame) -> MockFrameSource {
        let mut source = MockFrameSource::new();
        source
            .expect_acquire_frame()
            .returning(move || Ok(Some(frame.clone())));
        source
    }

    /// Scripts a server that expects the black frame and replies with `reply`.
    fn scripted_server(reply: &[u8]) -> tokio_test::io::Mock {
        let jpeg = encode_frame(&black(), DEFAULT_JPEG_QUALITY).unwrap();
        Builder::new().write(&framed(&jpeg)).read(&framed(reply)).build()
    }

    // ── Result handling ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_empty_result_skips_annotation() {
        // Arrange
        let stream = FramedStream::new(scripted_server(b"start  stop "));
        let mut source = source_of(black());
        let mut annotator = MockAnnotator::new();
        annotator.expect_annotate().never();
        let running = AtomicBool::new(true);

        // Act
        let summary = run_client_loop(stream, &mut source, &mut annotator, &one_frame(), &running)
            .await
            .unwrap();

        // Assert
        assert_eq!(summary.frames_sent, 1);
        assert_eq!(summary.results_received, 1);
        assert_eq!(summary.frames_without_detections, 1);
        assert_eq!(summary.frames_annotated, 0);
    }

    #[tokio::test]
    async fn test_detection_is_annotated_with_distance() {
        // Arrange
        let stream = FramedStream::new(scripted_server(b"start 0 0.87 10 20 50 60 stop "));
        let mut source = source_of(black());
        source
            .expect_lookup_point()
            .returning(|_, _| Some(Point3D::new(0.0, 0.0, 2.0)));
        let mut annotator = MockAnnotator::new();
        annotator
            .expect_annotate()
            .withf(|frame, annotations| {
                frame.width == 100
                    && annotations.len() == 1
                    && annotations[0].detection.bbox == BoundingBox::new(10, 20, 50, 60)
                    && annotations[0].label() == "0:2.00m"
            })
            .times(1)
            .return_const(());
        let running = AtomicBool::new(true);

        // Act
        let summary = run_client_loop(stream, &mut source, &mut annotator, &one_frame(), &running)
            .await
            .unwrap();

        // Assert
        assert_eq!(summary.frames_annotated, 1);
        assert!(summary.mean_latency().is_some());
    }

    #[tokio::test]
    async fn test_malformed_result_is_counted_not_fatal() {
        let stream = FramedStream::new(scripted_server(b"start 1 2 3 stop"));
        let mut source = source_of(black());
        let mut annotator = MockAnnotator::new();
        annotator.expect_annotate().never();
        let running = AtomicBool::new(true);

        let summary = run_client_loop(stream, &mut source, &mut annotator, &one_frame(), &running)
            .await
            .unwrap();

        assert_eq!(summary.malformed_results, 1);
        assert_eq!(summary.frames_annotated, 0);
    }

    #[tokio::test]
    async fn test_zero_length_result_means_no_detections() {
        let stream = FramedStream::new(scripted_server(b""));
        let mut source = source_of(black());
        let mut annotator = MockAnnotator::new();
        annotator.expect_annotate().never();
        let running = AtomicBool::new(true);

        let summary = run_client_loop(stream, &mut source, &mut annotator, &one_frame(), &running)
            .await
            .unwrap();

        assert_eq!(summary.frames_without_detections, 1);
        assert_eq!(summary.malformed_results, 0);
    }

    // ── Fatal paths ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_server_hang_up_is_fatal() {
        let jpeg = encode_frame(&black(), DEFAULT_JPEG_QUALITY).unwrap();
        let stream = FramedStream::new(Builder::new().write(&framed(&jpeg)).build());
        let mut source = source_of(black());
        let mut annotator = MockAnnotator::new();
        let running = AtomicBool::new(true);

        let result = run_client_loop(stream, &mut source, &mut annotator, &one_frame(), &running).await;

        assert!(matches!(result, Err(ClientError::ServerClosed)));
    }

    #[tokio::test]
    async fn test_truncated_result_is_transport_error() {
        let jpeg = encode_frame(&black(), DEFAULT_JPEG_QUALITY).unwrap();
        let io = Builder::new()
            .write(&framed(&jpeg))
            .read(&[0, 0, 0, 20])
            .read(b"start")
            .build();
        let mut source = source_of(black());
        let mut annotator = MockAnnotator::new();
        let running = AtomicBool::new(true);

        let result = run_client_loop(FramedStream::new(io), &mut source, &mut annotator, &one_frame(), &running).await;

        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportError::ShortFrame { expected: 20, received: 5 }))
        ));
    }

    #[tokio::test]
    async fn test_fatal_device_error_ends_run_and_closes_socket() {
        // Arrange
        let (client_io, mut server_io) = duplex(1024);
        let mut source = MockFrameSource::new();
        source
            .expect_acquire_frame()
            .returning(|| Err(DeviceError::Unavailable("unplugged".to_string())));
        let mut annotator = MockAnnotator::new();
        let running = AtomicBool::new(true);

        // Act
        let result = run_client_loop(
            FramedStream::new(client_io),
            &mut source,
            &mut annotator,
            &LoopSettings::default(),
            &running,
        )
        .await;

        // Assert
        assert!(matches!(result, Err(ClientError::Device(DeviceError::Unavailable(_)))));
        let mut buf = Vec::new();
        let n = tokio::io::AsyncReadExt::read_to_end(&mut server_io, &mut buf).await.unwrap();
        assert_eq!(n, 0, "peer should see an orderly close with no data");
    }

    // ── Acquisition and cancellation ──────────────────────────────────────────

    #[tokio::test]
    async fn test_cleared_flag_stops_before_first_acquire() {
        let stream = FramedStream::new(Builder::new().build());
        let mut source = MockFrameSource::new();
        source.expect_acquire_frame().never();
        let mut annotator = MockAnnotator::new();
        let running = AtomicBool::new(false);

        let summary = run_client_loop(stream, &mut source, &mut annotator, &LoopSettings::default(), &running)
            .await
            .unwrap();

        assert_eq!(summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_no_frame_and_grab_failure_are_retried() {
        // Arrange
        let mut calls = 0;
        let mut source = MockFrameSource::new();
        source.expect_acquire_frame().times(3).returning(move || {
            calls += 1;
            match calls {
                1 => Ok(None),
                2 => Err(DeviceError::Grab("dropped".to_string())),
                _ => Ok(Some(black())),
            }
        });
        let stream = FramedStream::new(scripted_server(b"start  stop "));
        let mut annotator = MockAnnotator::new();
        let running = AtomicBool::new(true);

        // Act
        let summary = run_client_loop(stream, &mut source, &mut annotator, &one_frame(), &running)
            .await
            .unwrap();

        // Assert
        assert_eq!(summary.grab_failures, 1);
        assert_eq!(summary.frames_sent, 1);
    }

    #[tokio::test]
    async fn test_unencodable_frame_is_skipped_without_sending() {
        let mut calls = 0;
        let mut source = MockFrameSource::new();
        source.expect_acquire_frame().times(2).returning(move || {
            calls += 1;
            Ok(Some(if calls == 1 { Frame::new(0, 0, 3, Vec::new()) } else { black() }))
        });
        let stream = FramedStream::new(scripted_server(b"start  stop "));
        let mut annotator = MockAnnotator::new();
        let running = AtomicBool::new(true);

        let summary = run_client_loop(stream, &mut source, &mut annotator, &one_frame(), &running)
            .await
            .unwrap();

        assert_eq!(summary.encode_failures, 1);
        assert_eq!(summary.frames_sent, 1);
    }

    #[test]
    fn test_mean_latency() {
        let summary = RunSummary {
            results_received: 4,
            total_round_trip: Duration::from_millis(100),
            ..RunSummary::default()
        };
        assert_eq!(summary.mean_latency(), Some(Duration::from_millis(25)));
        assert_eq!(RunSummary::default().mean_latency(), None);
    }
}
