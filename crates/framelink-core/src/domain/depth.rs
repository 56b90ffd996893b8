//! Depth-sensor points and the distance label rendered on the client.
//!
//! The depth sensor may have no data for a pixel (occlusion, out of range,
//! reflective surfaces).  It then reports NaN or infinite coordinates.  A NaN
//! must never reach the user-visible label, so [`Point3D::distance_m`] returns
//! `None` for any non-finite input and [`format_distance_label`] renders the
//! sentinel text `distance unknown` instead.

use serde::{Deserialize, Serialize};

/// Label text rendered when the distance cannot be computed.
pub const UNKNOWN_DISTANCE: &str = "distance unknown";

/// A point in the camera frame, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// A point carrying no depth information.
    pub fn invalid() -> Self {
        Self::new(f32::NAN, f32::NAN, f32::NAN)
    }

    /// Returns `true` if every coordinate is finite.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Euclidean distance from the camera origin, or `None` if the point is
    /// invalid.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use framelink_core::Point3D;
    ///
    /// assert_eq!(Point3D::new(3.0, 4.0, 0.0).distance_m(), Some(5.0));
    /// assert_eq!(Point3D::invalid().distance_m(), None);
    /// ```
    pub fn distance_m(&self) -> Option<f32> {
        if !self.is_valid() {
            return None;
        }
        let d = (self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        // Squaring can overflow to infinity for huge but finite inputs.
        d.is_finite().then_some(d)
    }
}

/// Renders the overlay text for one detection: `"<label>:<metres>m"` with two
/// decimals, or `"<label>:distance unknown"`.
pub fn format_distance_label(label: u32, distance_m: Option<f32>) -> String {
    match distance_m {
        Some(d) if d.is_finite() => format!("{label}:{d:.2}m"),
        _ => format!("{label}:{UNKNOWN_DISTANCE}"),
    }
}
