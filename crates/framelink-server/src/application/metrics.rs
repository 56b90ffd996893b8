//! Session statistics and server-wide aggregation.
//!
//! Each session counts into its own [`SessionStats`] and reports them once,
//! when it closes, as a [`MetricsEvent`] on an unbounded channel.  A single
//! [`MetricsCollector`] task folds the events into [`ServerMetrics`], which
//! anyone holding a [`MetricsHandle`] can snapshot.  Sessions never wait on
//! the collector.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Counters kept by one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Complete frame payloads received.
    pub frames_received: u64,
    /// Frames whose image could not be decoded.
    pub frames_dropped: u64,
    /// Frames the detector rejected (answered with an empty set).
    pub detector_failures: u64,
    /// Result messages sent back to the client.
    pub results_sent: u64,
    /// Total detections across all results sent.
    pub detections_sent: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Event sent from a session to the collector.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsEvent {
    SessionOpened { id: Uuid },
    SessionClosed { id: Uuid, stats: SessionStats, clean: bool },
}

/// Server-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerMetrics {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    /// Sessions that closed for any reason other than the peer hanging up.
    pub sessions_failed: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub detector_failures: u64,
    pub results_sent: u64,
    pub detections_sent: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl ServerMetrics {
    /// Folds one event into the totals.
    pub fn apply(&mut self, event: &MetricsEvent) {
        match event {
            MetricsEvent::SessionOpened { .. } => self.sessions_opened += 1,
            MetricsEvent::SessionClosed { stats, clean, .. } => {
                self.sessions_closed += 1;
                if !clean {
                    self.sessions_failed += 1;
                }
                self.frames_received += stats.frames_received;
                self.frames_dropped += stats.frames_dropped;
                self.detector_failures += stats.detector_failures;
                self.results_sent += stats.results_sent;
                self.detections_sent += stats.detections_sent;
                self.bytes_in += stats.bytes_in;
                self.bytes_out += stats.bytes_out;
            }
        }
    }

    /// Sessions opened but not yet reported closed.
    pub fn active_sessions(&self) -> u64 {
        self.sessions_opened.saturating_sub(self.sessions_closed)
    }
}

/// Read access to the aggregated totals.
#[derive(Debug, Clone, Default)]
pub struct MetricsHandle {
    inner: Arc<Mutex<ServerMetrics>>,
}

impl MetricsHandle {
    /// Returns a copy of the current totals.
    pub fn snapshot(&self) -> ServerMetrics {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Task body that drains [`MetricsEvent`]s into a shared [`ServerMetrics`].
pub struct MetricsCollector {
    rx: mpsc::UnboundedReceiver<MetricsEvent>,
    totals: Arc<Mutex<ServerMetrics>>,
}

impl MetricsCollector {
    /// Creates the collector, the sender sessions report on, and a read handle.
    pub fn new() -> (Self, mpsc::UnboundedSender<MetricsEvent>, MetricsHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = MetricsHandle::default();
        let collector = Self {
            rx,
            totals: Arc::clone(&handle.inner),
        };
        (collector, tx, handle)
    }

    /// Runs until every sender has been dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            debug!(?event, "metrics event");
            self.totals
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .apply(&event);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(frames: u64) -> SessionStats {
        SessionStats {
            frames_received: frames,
            results_sent: frames,
            detections_sent: frames * 2,
            bytes_in: frames * 100,
            bytes_out: frames * 16,
            ..SessionStats::default()
        }
    }

    #[test]
    fn test_apply_accumulates_closed_session_counters() {
        // Arrange
        let mut totals = ServerMetrics::default();
        let id = Uuid::new_v4();

        // Act
        totals.apply(&MetricsEvent::SessionOpened { id });
        totals.apply(&MetricsEvent::SessionClosed { id, stats: stats(5), clean: true });

        // Assert
        assert_eq!(totals.sessions_opened, 1);
        assert_eq!(totals.sessions_closed, 1);
        assert_eq!(totals.sessions_failed, 0);
        assert_eq!(totals.frames_received, 5);
        assert_eq!(totals.detections_sent, 10);
        assert_eq!(totals.bytes_in, 500);
        assert_eq!(totals.active_sessions(), 0);
    }

    #[test]
    fn test_unclean_close_counts_as_failed() {
        let mut totals = ServerMetrics::default();
        let id = Uuid::new_v4();
        totals.apply(&MetricsEvent::SessionOpened { id });
        totals.apply(&MetricsEvent::SessionClosed { id, stats: stats(0), clean: false });
        assert_eq!(totals.sessions_failed, 1);
    }

    #[test]
    fn test_active_sessions_tracks_open_minus_closed() {
        let mut totals = ServerMetrics::default();
        for _ in 0..3 {
            totals.apply(&MetricsEvent::SessionOpened { id: Uuid::new_v4() });
        }
        totals.apply(&MetricsEvent::SessionClosed {
            id: Uuid::new_v4(),
            stats: SessionStats::default(),
            clean: true,
        });
        assert_eq!(totals.active_sessions(), 2);
    }

    #[tokio::test]
    async fn test_collector_aggregates_events_from_many_senders() {
        let (collector, tx, handle) = MetricsCollector::new();
        let task = tokio::spawn(collector.run());

        for n in 1..=4 {
            let tx = tx.clone();
            let id = Uuid::new_v4();
            tx.send(MetricsEvent::SessionOpened { id }).unwrap();
            tx.send(MetricsEvent::SessionClosed { id, stats: stats(n), clean: true }).unwrap();
        }
        drop(tx);
        task.await.unwrap();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.sessions_closed, 4);
        assert_eq!(snapshot.frames_received, 1 + 2 + 3 + 4);
    }
}
