//! Raw colour image entity.

use serde::{Deserialize, Serialize};

/// One camera image: row-major, 8 bits per channel, interleaved channels.
///
/// Frames on the wire are always 3-channel RGB.  Capture devices that
/// deliver 4 channels (RGBA/BGRA) may hand those frames to the encoder
/// directly; the fourth channel is dropped during encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Interleaved channels per pixel (3 for RGB, 4 for RGBA).
    pub channels: u8,
    /// Pixel bytes, `width * height * channels` long.
    pub data: Vec<u8>,
}

impl Frame {
    /// Creates a frame from raw interleaved pixel bytes.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// Creates a 3-channel frame where every pixel has the colour `rgb`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use framelink_core::Frame;
    ///
    /// let frame = Frame::solid(100, 100, [0, 0, 0]);
    /// assert_eq!(frame.data.len(), 100 * 100 * 3);
    /// ```
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self::new(width, height, 3, data)
    }

    /// Number of pixels (`width * height`).
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of bytes the pixel buffer must hold for the declared shape.
    pub fn expected_len(&self) -> usize {
        self.area() * self.channels as usize
    }

    /// Returns `true` if the frame has zero width or zero height.
    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }
}
