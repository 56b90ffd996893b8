//! A detection paired with the distance measured at its centre.

use framelink_core::{format_distance_label, Detection};

/// What the client overlays for one detected object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
    pub detection: Detection,
    /// Distance in metres, or `None` when the depth sensor had no data.
    pub distance_m: Option<f32>,
}

impl Annotation {
    pub fn new(detection: Detection, distance_m: Option<f32>) -> Self {
        Self {
            detection,
            distance_m,
        }
    }

    /// Overlay text, e.g. `"0:2.05m"` or `"0:distance unknown"`.
    pub fn label(&self) -> String {
        format_distance_label(self.detection.label, self.distance_m)
    }
}
