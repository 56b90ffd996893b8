//! Interfaces to the capture device and the overlay renderer.
//!
//! The client loop only ever sees a [`FrameSource`]: something that hands out
//! colour frames and answers depth lookups by pixel coordinate.  Devices that
//! must be opened and released also implement [`CaptureDevice`] and are held
//! through a [`DeviceGuard`], which closes them on every exit path.

use framelink_core::{Frame, Point3D};
use thiserror::Error;
use tracing::debug;

use crate::domain::Annotation;

/// Error type for capture-device operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The device cannot be used at all (unplugged, failed to start).
    #[error("capture device unavailable: {0}")]
    Unavailable(String),

    /// A single grab failed; the next one may succeed.
    #[error("frame grab failed: {0}")]
    Grab(String),

    #[error("capture device is not open")]
    NotOpen,
}

impl DeviceError {
    /// Returns `true` if the run cannot continue with this device.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DeviceError::Grab(_))
    }
}

/// A source of colour frames with per-pixel depth lookup.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSource: Send {
    /// Returns the next frame, or `Ok(None)` when none is ready yet.
    fn acquire_frame(&mut self) -> Result<Option<Frame>, DeviceError>;

    /// Returns the 3-D point seen at pixel `(x, y)` of the most recent frame,
    /// or `None` when the coordinate is outside the depth map.
    ///
    /// A returned point may still be invalid (NaN) where the sensor had no
    /// data.
    fn lookup_point(&self, x: i32, y: i32) -> Option<Point3D>;
}

/// A frame source with an explicit open/close lifecycle.
pub trait CaptureDevice: FrameSource {
    fn open(&mut self) -> Result<(), DeviceError>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
}

/// Renders detections over the frame they were found in.
#[cfg_attr(test, mockall::automock)]
pub trait Annotator: Send {
    fn annotate(&mut self, frame: &Frame, annotations: &[Annotation]);
}

/// Scoped ownership of an opened [`CaptureDevice`].
///
/// The device is opened by [`DeviceGuard::open`] and closed when the guard is
/// dropped, whether the run ended normally, failed, or panicked.
#[derive(Debug)]
pub struct DeviceGuard<D: CaptureDevice> {
    device: D,
}

impl<D: CaptureDevice> DeviceGuard<D> {
    /// Opens `device` and takes ownership of it.
    ///
    /// # Errors
    ///
    /// Returns the device's error if it fails to open.
    pub fn open(mut device: D) -> Result<Self, DeviceError> {
        device.open()?;
        Ok(Self { device })
    }

    pub fn get_ref(&self) -> &D {
        &self.device
    }
}

impl<D: CaptureDevice> Drop for DeviceGuard<D> {
    fn drop(&mut self) {
        if self.device.is_open() {
            self.device.close();
            debug!("capture device closed");
        }
    }
}

impl<D: CaptureDevice> FrameSource for DeviceGuard<D> {
    fn acquire_frame(&mut self) -> Result<Option<Frame>, DeviceError> {
        self.device.acquire_frame()
    }

    fn lookup_point(&self, x: i32, y: i32) -> Option<Point3D> {
        self.device.lookup_point(x, y)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
