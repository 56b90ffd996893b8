//! Built-in detectors that need no model runtime.
//!
//! The server binary uses [`StaticDetector`] so the whole pipeline can run
//! end-to-end on machines without an inference stack.  A real model plugs in
//! by implementing [`Detector`].

use framelink_core::{Detection, Frame};

use crate::application::detector::{DetectResult, Detector};

/// Returns the same detection set for every frame.
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    detections: Vec<Detection>,
}

impl StaticDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

impl Detector for StaticDetector {
    fn detect(&mut self, _frame: &Frame) -> DetectResult {
        Ok(self.detections.clone())
    }
}

/// Never detects anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetector;

impl Detector for NullDetector {
    fn detect(&mut self, _frame: &Frame) -> DetectResult {
        Ok(Vec::new())
    }
}
