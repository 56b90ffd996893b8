//! JPEG encoding and decoding of [`Frame`]s.
//!
//! The wire carries one lossy JPEG image per frame.  Decoding always yields
//! an interleaved 3-channel RGB frame, whatever the source channel count.

use std::borrow::Cow;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageFormat};
use thiserror::Error;

use crate::domain::frame::Frame;

/// Default JPEG quality used by the client.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Errors raised while encoding or decoding a frame image.
///
/// All variants are recoverable: the caller drops the affected frame and
/// moves on to the next one.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("cannot encode an empty {width}x{height} frame")]
    EmptyFrame { width: u32, height: u32 },

    #[error("unsupported channel count {0} (expected 3 or 4)")]
    UnsupportedChannels(u8),

    #[error("pixel buffer holds {actual} bytes, frame shape requires {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("JPEG decoding failed: {0}")]
    Decode(String),
}

/// Encodes `frame` as a JPEG image at the given quality (clamped to 1..=100).
///
/// 4-channel frames have their fourth channel dropped before encoding.
///
/// # Errors
///
/// Returns [`CodecError`] for a zero-area frame, a channel count other than
/// 3 or 4, a pixel buffer that does not match the declared shape, or an
/// encoder failure.
pub fn encode_frame(frame: &Frame, quality: u8) -> Result<Vec<u8>, CodecError> {
    if frame.is_empty() {
        return Err(CodecError::EmptyFrame {
            width: frame.width,
            height: frame.height,
        });
    }
    if frame.channels != 3 && frame.channels != 4 {
        return Err(CodecError::UnsupportedChannels(frame.channels));
    }
    if frame.data.len() != frame.expected_len() {
        return Err(CodecError::BufferSizeMismatch {
            expected: frame.expected_len(),
            actual: frame.data.len(),
        });
    }

    let rgb: Cow<'_, [u8]> = if frame.channels == 4 {
        Cow::Owned(strip_alpha(&frame.data))
    } else {
        Cow::Borrowed(&frame.data)
    };

    let mut out = Vec::with_capacity(frame.area() / 4);
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder
            .encode(&rgb, frame.width, frame.height, ColorType::Rgb8)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
    }
    Ok(out)
}

/// Decodes a JPEG image into a 3-channel RGB frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if `bytes` is not a decodable JPEG image.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| CodecError::Decode(e.to_string()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    Ok(Frame::new(width, height, 3, image.into_raw()))
}

fn strip_alpha(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}
