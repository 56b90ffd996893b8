//! Overlay sink that writes annotations to the log.
//!
//! Stands in for an on-screen renderer on headless edge devices.

use framelink_core::Frame;
use tracing::{debug, info};

use crate::application::Annotator;
use crate::domain::Annotation;

/// Logs one line per annotation at `info`.
#[derive(Debug, Default)]
pub struct LogAnnotator {
    frames: u64,
    annotations: u64,
}

impl LogAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames annotated so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Annotations rendered so far, across all frames.
    pub fn annotations(&self) -> u64 {
        self.annotations
    }
}

impl Annotator for LogAnnotator {
    fn annotate(&mut self, frame: &Frame, annotations: &[Annotation]) {
        self.frames += 1;
        debug!("annotating frame {} ({}x{})", self.frames, frame.width, frame.height);
        for annotation in annotations {
            let b = annotation.detection.bbox;
            info!(
                "[{}] conf={:.2} box=({},{})-({},{})",
                annotation.label(),
                annotation.detection.confidence,
                b.x1,
                b.y1,
                b.x2,
                b.y2
            );
        }
        self.annotations += annotations.len() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelink_core::{BoundingBox, Detection};

    #[test]
    fn test_counts_frames_and_annotations() {
        let mut annotator = LogAnnotator::new();
        let frame = Frame::solid(4, 4, [0, 0, 0]);
        let a = Annotation::new(Detection::new(0, 0.9, BoundingBox::new(0, 0, 2, 2)), None);

        annotator.annotate(&frame, &[a, a]);
        annotator.annotate(&frame, &[a]);

        assert_eq!(annotator.frames(), 2);
        assert_eq!(annotator.annotations(), 3);
    }
}
