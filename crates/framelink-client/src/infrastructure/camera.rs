//! Synthetic RGB-D camera.
//!
//! Produces solid-colour frames of a flat scene at a fixed distance and
//! back-projects pixels through a simple pinhole model (focal length equal
//! to the image width, principal point at the image centre).  Used for
//! demos and end-to-end tests where no sensor is attached.

use std::time::{Duration, Instant};

use framelink_core::{Frame, Point3D};
use tracing::{debug, info};

use crate::application::{CaptureDevice, DeviceError, FrameSource};
use crate::domain::CameraConfig;

#[derive(Debug)]
pub struct SyntheticCamera {
    config: CameraConfig,
    open: bool,
    last_frame_at: Option<Instant>,
    frames: u64,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            open: false,
            last_frame_at: None,
            frames: 0,
        }
    }

    /// Frames delivered since the camera was created.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.config.frame_interval_ms)
    }

    fn render(&self) -> Frame {
        let CameraConfig {
            width,
            height,
            channels,
            color,
            ..
        } = self.config;
        if channels == 4 {
            let mut data = Vec::with_capacity(width as usize * height as usize * 4);
            for _ in 0..width as usize * height as usize {
                data.extend_from_slice(&[color[0], color[1], color[2], u8::MAX]);
            }
            Frame::new(width, height, 4, data)
        } else {
            Frame::solid(width, height, color)
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn acquire_frame(&mut self) -> Result<Option<Frame>, DeviceError> {
        if !self.open {
            return Err(DeviceError::NotOpen);
        }
        if let Some(last) = self.last_frame_at {
            if last.elapsed() < self.frame_interval() {
                return Ok(None);
            }
        }
        self.last_frame_at = Some(Instant::now());
        self.frames += 1;
        Ok(Some(self.render()))
    }

    fn lookup_point(&self, x: i32, y: i32) -> Option<Point3D> {
        let (w, h) = (self.config.width as i32, self.config.height as i32);
        if !self.open || x < 0 || y < 0 || x >= w || y >= h {
            return None;
        }
        if self.config.invalid_depth {
            return Some(Point3D::invalid());
        }

        let z = self.config.depth_m;
        let focal = self.config.width as f32;
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        Some(Point3D::new(
            (x as f32 - cx) * z / focal,
            (y as f32 - cy) * z / focal,
            z,
        ))
    }
}

impl CaptureDevice for SyntheticCamera {
    fn open(&mut self) -> Result<(), DeviceError> {
        let c = &self.config;
        if c.width == 0 || c.height == 0 {
            return Err(DeviceError::Unavailable(format!(
                "invalid resolution {}x{}",
                c.width, c.height
            )));
        }
        if c.channels != 3 && c.channels != 4 {
            return Err(DeviceError::Unavailable(format!(
                "unsupported channel count {}",
                c.channels
            )));
        }
        self.open = true;
        self.last_frame_at = None;
        info!(
            "synthetic camera opened — {}x{}x{}, depth {} m",
            c.width, c.height, c.channels, c.depth_m
        );
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        debug!("synthetic camera closed after {} frames", self.frames);
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
