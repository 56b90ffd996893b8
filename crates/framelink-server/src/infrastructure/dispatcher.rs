//! TCP accept loop and session supervision.
//!
//! The dispatcher:
//!
//! 1. Binds a TCP listener on the configured address.
//! 2. Accepts connections and runs each one as its own Tokio task
//!    ([`run_session`]), so one slow client never delays another.
//! 3. Optionally caps concurrent sessions: with `max_sessions` set, a
//!    semaphore permit is taken *before* accepting, so excess clients wait
//!    in the kernel backlog instead of being accepted and starved.
//! 4. Checks the shared `running` flag every 200 ms.  On shutdown it stops
//!    accepting, gives in-flight sessions a grace period to finish, then
//!    aborts whatever is left.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use framelink_core::FramedStream;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc::UnboundedSender, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::detector::DetectorHandle;
use crate::application::metrics::MetricsEvent;
use crate::application::session::{run_session, SessionContext, SessionReport};
use crate::domain::config::ServerConfig;

/// How often the accept loop wakes up to check the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Transport settings applied to every accepted connection.
#[derive(Debug, Clone, Copy)]
struct StreamSettings {
    io_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    max_frame_len: u32,
}

/// Shared count of running sessions.
#[derive(Debug, Clone, Default)]
pub struct ActiveSessions(Arc<AtomicUsize>);

impl ActiveSessions {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn enter(&self) -> ActiveGuard {
        self.0.fetch_add(1, Ordering::Relaxed);
        ActiveGuard(Arc::clone(&self.0))
    }
}

/// Decrements the active count when a session task ends, even if aborted.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Accepts connections and supervises their sessions.
pub struct Dispatcher {
    listener: TcpListener,
    detector: DetectorHandle,
    metrics: Option<UnboundedSender<MetricsEvent>>,
    limiter: Option<Arc<Semaphore>>,
    active: ActiveSessions,
    settings: StreamSettings,
    shutdown_grace: Duration,
}

impl Dispatcher {
    /// Binds the listener described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (port in use, missing
    /// permission, ...).
    pub async fn bind(config: &ServerConfig, detector: DetectorHandle) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind frame listener on {}", config.bind_addr))?;

        Ok(Self {
            listener,
            detector,
            metrics: None,
            limiter: config.max_sessions.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            active: ActiveSessions::default(),
            settings: StreamSettings {
                io_timeout: config.io_timeout(),
                idle_timeout: config.idle_timeout(),
                max_frame_len: config.max_frame_len,
            },
            shutdown_grace: config.shutdown_grace(),
        })
    }

    /// Reports every session's open/close events on `metrics`.
    pub fn with_metrics(mut self, metrics: UnboundedSender<MetricsEvent>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The address actually bound (useful when binding port 0).
    ///
    /// # Errors
    ///
    /// Propagates the OS error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.active.count()
    }

    /// A cloneable view of the active-session count that outlives `run`.
    pub fn active_tracker(&self) -> ActiveSessions {
        self.active.clone()
    }

    /// Accepts connections until `running` is cleared, then drains sessions.
    ///
    /// Returns the number of connections accepted.
    pub async fn run(self, running: Arc<AtomicBool>) -> u64 {
        match self.local_addr() {
            Ok(addr) => info!("FrameLink server listening on {addr}"),
            Err(e) => warn!("FrameLink server listening (address unavailable: {e})"),
        }

        let mut sessions: JoinSet<SessionReport> = JoinSet::new();
        let mut accepted = 0u64;

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }
            while let Some(joined) = sessions.try_join_next() {
                log_join(joined);
            }

            // Wait for a free slot first so excess clients stay in the backlog.
            let permit = match &self.limiter {
                Some(limiter) => match timeout(ACCEPT_POLL, Arc::clone(limiter).acquire_owned()).await {
                    Ok(Ok(permit)) => Some(permit),
                    Ok(Err(_)) => break,
                    Err(_) => continue,
                },
                None => None,
            };

            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    accepted += 1;
                    self.spawn_session(&mut sessions, stream, peer, permit);
                }
                Ok(Err(e)) => {
                    // Transient (e.g. out of file descriptors); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {}
            }
        }

        self.drain(sessions).await;
        accepted
    }

    fn spawn_session(
        &self,
        sessions: &mut JoinSet<SessionReport>,
        stream: TcpStream,
        peer: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY for {peer}: {e}");
        }
        let framed = FramedStream::new(stream)
            .with_io_timeout(self.settings.io_timeout)
            .with_idle_timeout(self.settings.idle_timeout)
            .with_max_frame_len(self.settings.max_frame_len);

        let mut ctx = SessionContext::new(peer.to_string(), self.detector.clone());
        if let Some(tx) = &self.metrics {
            ctx = ctx.with_metrics(tx.clone());
        }
        info!(session = %ctx.id, "accepted connection from {peer}");

        let guard = self.active.enter();
        sessions.spawn(async move {
            let _guard = guard;
            let _permit = permit;
            run_session(framed, ctx).await
        });
    }

    async fn drain(&self, mut sessions: JoinSet<SessionReport>) {
        if sessions.is_empty() {
            return;
        }
        info!(
            "waiting up to {:?} for {} in-flight sessions",
            self.shutdown_grace,
            sessions.len()
        );
        let finished = timeout(self.shutdown_grace, async {
            while let Some(joined) = sessions.join_next().await {
                log_join(joined);
            }
        })
        .await;
        if finished.is_err() {
            warn!("aborting {} sessions still running after grace period", sessions.len());
            sessions.shutdown().await;
        }
    }
}

fn log_join(joined: Result<SessionReport, JoinError>) {
    match joined {
        Ok(report) => debug!(
            session = %report.id,
            "session for {} reaped: {} frames, {} results",
            report.peer,
            report.stats.frames_received,
            report.stats.results_sent
        ),
        Err(e) if e.is_cancelled() => debug!("session task cancelled"),
        Err(e) => error!("session task panicked: {e}"),
    }
}

/// Binds the configured address and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    config: &ServerConfig,
    detector: DetectorHandle,
    metrics: Option<UnboundedSender<MetricsEvent>>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<u64> {
    let mut dispatcher = Dispatcher::bind(config, detector).await?;
    if let Some(tx) = metrics {
        dispatcher = dispatcher.with_metrics(tx);
    }
    Ok(dispatcher.run(running).await)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
