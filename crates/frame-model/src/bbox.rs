//! Bounding box type for detected and tracked plate regions.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in absolute pixel coordinates.
///
/// `(x1, y1)` is the top-left corner and `(x2, y2)` the exclusive
/// bottom-right corner. Detector and tracker output may lie partly outside
/// the frame or be degenerate; consumers clamp before touching pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a box from a top-left corner and a size.
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x.saturating_add(width),
            y2: y.saturating_add(height),
        }
    }

    /// Build a box from floating point `(x, y, w, h)` as trackers report it.
    ///
    /// Corners are truncated toward zero, matching integer casts of the
    /// tracker output.
    pub fn from_xywh_f64(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x1: x as i32,
            y1: y as i32,
            x2: (x + width) as i32,
            y2: (y + height) as i32,
        }
    }

    /// Build a box from floating point corners, rounding to the nearest pixel.
    pub fn from_corners_f32(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.round() as i32,
            y1: y1.round() as i32,
            x2: x2.round() as i32,
            y2: y2.round() as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Area in pixels; zero for degenerate or inverted boxes.
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width() as i64 * self.height() as i64
        }
    }

    /// True when the box has no positive area.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Center point (integer division, rounds toward negative infinity).
    pub fn center(&self) -> (i32, i32) {
        (
            (self.x1 + self.x2).div_euclid(2),
            (self.y1 + self.y2).div_euclid(2),
        )
    }

    /// Whether every corner lies within `[0, width] x [0, height]`.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let (w, h) = (width as i64, height as i64);
        self.x1 >= 0
            && self.y1 >= 0
            && self.x1 <= self.x2
            && self.y1 <= self.y2
            && self.x2 as i64 <= w
            && self.y2 as i64 <= h
    }

    /// Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) as f64 * (y2 - y1) as f64;
        let union = self.area() as f64 + other.area() as f64 - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x1, self.y1, self.x2, self.y2)
    }
}
