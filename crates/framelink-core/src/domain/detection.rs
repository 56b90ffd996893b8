//! Detection entity: one object reported by the model for one frame.

use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle `(x1, y1)`–`(x2, y2)`.
///
/// `x1 < x2` and `y1 < y2` are expected but not enforced; the wire protocol
/// carries whatever the model emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer midpoint of the box, used as the depth lookup pixel.
    ///
    /// Computed in `i64` so boxes near `i32::MAX` cannot overflow.
    pub fn center(&self) -> (i32, i32) {
        let cx = (self.x1 as i64 + self.x2 as i64).div_euclid(2);
        let cy = (self.y1 as i64 + self.y2 as i64).div_euclid(2);
        (cx as i32, cy as i32)
    }
}

/// One model output: class label, confidence in `[0, 1]`, and bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Integer class id as emitted by the model.
    pub label: u32,
    /// Model confidence; expected in `[0, 1]`.
    pub confidence: f32,
    /// Pixel rectangle of the detected object.
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: u32, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label,
            confidence,
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_is_integer_midpoint() {
        let bbox = BoundingBox::new(10, 20, 50, 60);
        assert_eq!(bbox.center(), (30, 40));
    }

    #[test]
    fn test_center_rounds_toward_negative_infinity_for_odd_sums() {
        let bbox = BoundingBox::new(0, -1, 5, 0);
        assert_eq!(bbox.center(), (2, -1));
    }

    #[test]
    fn test_center_does_not_overflow_near_i32_max() {
        let bbox = BoundingBox::new(i32::MAX - 2, 0, i32::MAX, 0);
        assert_eq!(bbox.center().0, i32::MAX - 1);
    }
}
