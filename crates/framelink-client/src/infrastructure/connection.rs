//! Outbound TCP connection to the processing server.

use std::time::Duration;

use framelink_core::{FramedStream, TransportError};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Connects to `addr` and wraps the socket in a [`FramedStream`].
///
/// `io_timeout` bounds every send and the whole wait for each result, since
/// the server only speaks in reply to a frame.
///
/// # Errors
///
/// Returns [`TransportError::TimedOut`] if the connection is not established
/// within `connect_timeout`, or [`TransportError::Io`] if it is refused or the
/// host cannot be resolved.
pub async fn connect(
    addr: &str,
    connect_timeout: Duration,
    io_timeout: Option<Duration>,
) -> Result<FramedStream<TcpStream>, TransportError> {
    debug!("connecting to {addr}");
    let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::TimedOut(connect_timeout))??;
    stream.set_nodelay(true)?;
    info!("connected to {}", stream.peer_addr()?);

    Ok(FramedStream::new(stream)
        .with_io_timeout(io_timeout)
        .with_idle_timeout(io_timeout))
}
