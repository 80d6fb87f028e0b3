//! Contour area-ratio strategy.
//!
//! The polygon is split into a fan of triangles anchored at the first point,
//! `(p0, p[i+1], p[i+2])` for `i in 0..n-2`, and each triangle's area comes
//! from Heron's formula on its side lengths. Movement on frame `k` means
//! `|area_k - area_{k-1}| / area_{k-1} > cutoff`.

use crate::sensing::{Measurement, Point};
use crate::signal::SignalSource;

/// Area of a triangle with side lengths `a`, `b`, `c` (Heron's formula).
///
/// Rounding on degenerate triangles can push the product slightly below
/// zero; that is treated as zero area.
pub fn triangle_area(a: f64, b: f64, c: f64) -> f64 {
    let s = (a + b + c) / 2.0;
    let product = s * (s - a) * (s - b) * (s - c);
    product.max(0.0).sqrt()
}

/// Fan-triangulated area of a polygon. Fewer than three points yield `0.0`.
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let p0 = points[0];
    points[1..]
        .windows(2)
        .map(|pair| {
            let (p1, p2) = (pair[0], pair[1]);
            triangle_area(p0.distance(&p1), p0.distance(&p2), p1.distance(&p2))
        })
        .sum()
}

/// Flags movement when the contour area changes sharply between frames.
#[derive(Debug, Clone)]
pub struct AreaRatioSignal {
    cutoff: f64,
    previous_area: Option<f64>,
}

impl AreaRatioSignal {
    pub fn new(cutoff: f64) -> Self {
        Self {
            cutoff,
            previous_area: None,
        }
    }

    pub fn previous_area(&self) -> Option<f64> {
        self.previous_area
    }

    fn exceeds_cutoff(&self, previous: f64, current: f64) -> bool {
        let change = (current - previous).abs();
        if previous == 0.0 {
            // Growing from nothing is an unbounded ratio; staying at nothing is no change.
            return change > 0.0;
        }
        change / previous > self.cutoff
    }
}

impl SignalSource for AreaRatioSignal {
    fn sample(&mut self, measurement: &Measurement) -> Option<bool> {
        match measurement {
            Measurement::Contour { points } => {
                let area = polygon_area(points);
                let sample = self
                    .previous_area
                    .map(|previous| self.exceeds_cutoff(previous, area));
                self.previous_area = Some(area);
                sample
            }
            Measurement::NoSubject => Some(false),
            Measurement::Scalar { .. } => None,
        }
    }

    fn reset(&mut self) {
        self.previous_area = None;
    }

    fn name(&self) -> &'static str {
        "area_ratio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> Measurement {
        Measurement::contour([(0.0, 0.0), (side, 0.0), (side, side), (0.0, side)])
    }

    #[test]
    fn test_unit_square_area() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        assert!((polygon_area(&points) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_heron_right_triangle() {
        assert!((triangle_area(3.0, 4.0, 5.0) - 6.0).abs() < 1e-12);
        assert_eq!(triangle_area(1.0, 1.0, 2.0), 0.0);
    }

    #[test]
    fn test_too_few_points_is_zero_area() {
        assert_eq!(polygon_area(&[]), 0.0);
        assert_eq!(
            polygon_area(&[Point::new(0.0, 0.0), Point::new(5.0, 5.0)]),
            0.0
        );
    }

    #[test]
    fn test_first_frame_has_no_sample() {
        let mut signal = AreaRatioSignal::new(2.0);
        assert_eq!(signal.sample(&square(1.0)), None);
        assert!(signal.previous_area().is_some());
    }

    #[test]
    fn test_ratio_against_previous_area() {
        let mut signal = AreaRatioSignal::new(2.0);
        signal.sample(&square(1.0));

        // area 1 -> 4: ratio 3
        assert_eq!(signal.sample(&square(2.0)), Some(true));
        // area 4 -> 1: ratio 0.75
        assert_eq!(signal.sample(&square(1.0)), Some(false));
        // area 1 -> 1: ratio 0
        assert_eq!(signal.sample(&square(1.0)), Some(false));
    }

    #[test]
    fn test_no_subject_keeps_previous_area() {
        let mut signal = AreaRatioSignal::new(2.0);
        signal.sample(&square(1.0));
        assert_eq!(signal.sample(&Measurement::NoSubject), Some(false));
        assert_eq!(signal.sample(&square(2.0)), Some(true));
    }

    #[test]
    fn test_growth_from_zero_area() {
        let mut signal = AreaRatioSignal::new(2.0);
        signal.sample(&Measurement::contour([(0.0, 0.0), (1.0, 1.0)]));
        assert_eq!(
            signal.sample(&Measurement::contour([(0.0, 0.0), (1.0, 1.0)])),
            Some(false)
        );
        assert_eq!(signal.sample(&square(1.0)), Some(true));
    }

    #[test]
    fn test_reset_forgets_previous_frame() {
        let mut signal = AreaRatioSignal::new(2.0);
        signal.sample(&square(1.0));
        signal.reset();
        assert_eq!(signal.sample(&square(3.0)), None);
    }
}
