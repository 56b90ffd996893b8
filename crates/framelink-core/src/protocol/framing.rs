//! Length-prefixed message framing over a byte stream.
//!
//! # Why framing is needed
//!
//! TCP is a *stream* protocol: it delivers bytes, not messages.  A single
//! `read()` may return part of a message, or the tail of one message and the
//! head of the next; a single `write()` may accept only part of the buffer.
//! Every FrameLink message is therefore prefixed with its payload length:
//!
//! ```text
//! [payload_len:4 big-endian][payload:N]
//! ```
//!
//! The reader loops until exactly `payload_len` bytes have arrived and the
//! writer loops until every byte has been accepted.  A payload cut short by
//! the peer closing the stream is reported as [`TransportError::ShortFrame`]
//! and discarded; it is never handed to a decoder.
//!
//! # End of stream
//!
//! If the stream closes before a complete 4-byte prefix arrives, the reader
//! returns `Ok(None)`: the peer shut down between messages, which is the
//! orderly way to end a session.

use std::future::Future;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Size of the big-endian payload length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload accepted by default (16 MiB).
///
/// A 1280×720 JPEG is typically well under 1 MiB; the limit exists so that a
/// corrupt length prefix cannot trigger a multi-gigabyte allocation.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Errors raised by the framed transport.
///
/// Every variant is fatal to the connection it occurred on.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying stream failed to read or write.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream closed part-way through a payload.
    #[error("short frame: expected {expected} payload bytes, stream closed after {received}")]
    ShortFrame { expected: usize, received: usize },

    /// The payload length exceeds the configured limit.
    #[error("frame of {len} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// A read or write did not complete within its deadline.
    #[error("transport operation timed out after {0:?}")]
    TimedOut(Duration),
}

impl TransportError {
    /// Returns `true` if the error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::TimedOut(_))
    }
}

// ── Free functions ────────────────────────────────────────────────────────────

/// Writes one length-prefixed frame and flushes the writer.
///
/// `write_all` keeps calling the underlying writer until every byte has been
/// accepted, so partial writes are retried transparently.
///
/// # Errors
///
/// Returns [`TransportError::FrameTooLarge`] if `payload` is longer than
/// `max_len`, or [`TransportError::Io`] if the writer fails.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max_len: u32) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    check_len(payload.len(), max_len)?;
    // Lossless: check_len bounds the length by a u32.
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

// ── FramedStream ──────────────────────────────────────────────────────────────

/// A duplex byte stream speaking the length-prefixed protocol.
///
/// Wraps any `AsyncRead + AsyncWrite` (a `TcpStream`, an in-memory duplex
/// pipe in tests) and adds deadlines, a maximum frame length, and byte
/// counters.
///
/// Two deadlines apply to [`recv_framed`](Self::recv_framed):
///
/// - `idle_timeout` bounds the wait for the *first* bytes of the next
///   message (how long a peer may stay silent between messages);
/// - `io_timeout` bounds reading the payload once its prefix has arrived,
///   and bounds every [`send_framed`](Self::send_framed).
///
/// `None` disables the respective deadline.
#[derive(Debug)]
pub struct FramedStream<S> {
    inner: S,
    io_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    max_frame_len: u32,
    bytes_read: u64,
    bytes_written: u64,
}

impl<S> FramedStream<S> {
    /// Wraps `inner` with no deadlines and the default frame limit.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            io_timeout: None,
            idle_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Sets the deadline for sends and for payload reads.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the deadline for waiting on the next message prefix.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the largest payload accepted or sent.
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Total bytes (prefixes included) consumed by completed receives.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Total bytes (prefixes included) written by completed sends.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends `payload` as one framed message.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`]; the caller must treat it as connection-fatal.
    pub async fn send_framed(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let max = self.max_frame_len;
        with_deadline(self.io_timeout, write_frame(&mut self.inner, payload, max)).await?;
        self.bytes_written += (LENGTH_PREFIX_SIZE + payload.len()) as u64;
        Ok(())
    }

    /// Receives one framed message, or `None` on orderly end-of-stream.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`]; a truncated payload is reported as
    /// [`TransportError::ShortFrame`] and never returned.
    pub async fn recv_framed(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        let first =
            with_deadline(self.idle_timeout, read_full(&mut self.inner, &mut prefix[..1])).await?;
        if first == 0 {
            return Ok(None);
        }
        // The message has started: the rest of it is bounded by io_timeout.
        let rest =
            with_deadline(self.io_timeout, read_full(&mut self.inner, &mut prefix[1..])).await?;
        let Some(len) = parse_prefix(&prefix, first + rest, self.max_frame_len)? else {
            return Ok(None);
        };

        let mut payload = vec![0u8; len];
        let received =
            with_deadline(self.io_timeout, read_full(&mut self.inner, &mut payload)).await?;
        let payload = finish_payload(payload, received)?;
        self.bytes_read += (LENGTH_PREFIX_SIZE + len) as u64;
        Ok(payload)
    }

    /// Flushes and shuts down the write side of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the shutdown does not complete.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        with_deadline(self.io_timeout, self.inner.shutdown()).await
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Reads until `buf` is full or the stream ends; returns the bytes read.
///
/// Unlike `read_exact`, this reports how far it got, which distinguishes
/// "closed between messages" from "closed mid-payload".
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Interprets a (possibly incomplete) length prefix.
fn parse_prefix(
    prefix: &[u8; LENGTH_PREFIX_SIZE],
    got: usize,
    max_len: u32,
) -> Result<Option<usize>, TransportError> {
    if got < LENGTH_PREFIX_SIZE {
        if got > 0 {
            debug!("stream closed after {got} of {LENGTH_PREFIX_SIZE} length-prefix bytes");
        }
        return Ok(None);
    }
    let len = u32::from_be_bytes(*prefix) as usize;
    check_len(len, max_len)?;
    Ok(Some(len))
}

fn finish_payload(payload: Vec<u8>, received: usize) -> Result<Option<Vec<u8>>, TransportError> {
    if received < payload.len() {
        return Err(TransportError::ShortFrame {
            expected: payload.len(),
            received,
        });
    }
    Ok(Some(payload))
}

fn check_len(len: usize, max_len: u32) -> Result<(), TransportError> {
    if len > max_len as usize {
        return Err(TransportError::FrameTooLarge {
            len,
            max: max_len as usize,
        });
    }
    Ok(())
}

async fn with_deadline<T, E, F>(deadline: Option<Duration>, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<TransportError>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TransportError::TimedOut(limit))?
            .map_err(Into::into),
        None => fut.await.map_err(Into::into),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
