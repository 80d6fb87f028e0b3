//! Per-frame measurement types delivered by a sensing backend.
//!
//! The gate never sees images or landmarks directly. A backend reduces each
//! frame to either a scalar metric or a mouth contour, or reports that no
//! face was found.

use serde::{Deserialize, Serialize};

/// A 2-D point on a tracked contour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// One frame's worth of input from the sensing backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    /// Scalar jaw-openness estimate in `[0, 1]`.
    Scalar { value: f64 },
    /// Ordered points outlining the inner lips.
    Contour { points: Vec<Point> },
    /// No face was tracked in this frame.
    NoSubject,
}

impl Measurement {
    pub fn scalar(value: f64) -> Self {
        Measurement::Scalar { value }
    }

    pub fn contour<P: Into<Point>>(points: impl IntoIterator<Item = P>) -> Self {
        Measurement::Contour {
            points: points.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_subject(&self) -> bool {
        !matches!(self, Measurement::NoSubject)
    }
}
