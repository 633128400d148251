// src/types.rs

use serde::{Deserialize, Serialize};

/// A circle reported by the Hough circle detector, in integer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circle {
    pub x: i32,
    pub y: i32,
    pub r: i32,
}

impl Circle {
    pub fn new(x: i32, y: i32, r: i32) -> Self {
        Self { x, y, r }
    }

    /// Build from raw detector output. Rounds half to even, matching how the
    /// accumulator centers were historically snapped to pixels.
    pub fn from_detection(x: f32, y: f32, r: f32) -> Self {
        Self {
            x: x.round_ties_even() as i32,
            y: y.round_ties_even() as i32,
            r: r.round_ties_even() as i32,
        }
    }
}

/// A line segment between two integer endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn to_array(self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl From<[i32; 4]> for LineSegment {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// `y = slope * x + intercept`, in image coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeIntercept {
    pub slope: f64,
    pub intercept: f64,
}

/// Averaged lane boundaries for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LanePair {
    pub left: Option<LineSegment>,
    pub right: Option<LineSegment>,
}

impl LanePair {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Color in OpenCV's blue/green/red channel order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bgr(pub f64, pub f64, pub f64);

impl Bgr {
    pub const GREEN: Bgr = Bgr(0.0, 255.0, 0.0);
    pub const RED: Bgr = Bgr(0.0, 0.0, 255.0);
    /// The slightly blue-shifted green the can scripts draw with.
    pub const CAN_GREEN: Bgr = Bgr(0.0, 255.0, 67.0);
}
