//! Sheet geometry primitives.
//!
//! `SheetCorners` stores the four corners of a detected sheet in canonical
//! clockwise order (top-left, top-right, bottom-right, bottom-left). The only
//! way to construct one is [`order_corners`], so a value of this type is
//! always canonically ordered no matter which order the contour tracer
//! emitted the vertices in.

use serde::{Deserialize, Serialize};

/// Pixel coordinate in frame/screen space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Four corners of a detected sheet, canonically ordered.
///
/// Fields are private: construction goes through [`order_corners`] only.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetCorners {
    top_left: Point,
    top_right: Point,
    bottom_right: Point,
    bottom_left: Point,
}

impl SheetCorners {
    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn top_right(&self) -> Point {
        self.top_right
    }

    pub fn bottom_right(&self) -> Point {
        self.bottom_right
    }

    pub fn bottom_left(&self) -> Point {
        self.bottom_left
    }

    /// Corners in canonical clockwise order starting at top-left.
    pub fn as_array(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Largest displacement between corresponding corners of two detections.
    pub fn max_displacement(&self, other: &SheetCorners) -> f64 {
        self.as_array()
            .iter()
            .zip(other.as_array().iter())
            .map(|(a, b)| a.distance_to(*b))
            .fold(0.0, f64::max)
    }
}

/// Order four vertices canonically.
///
/// Sort by `x + y`: the minimum is top-left, the maximum is bottom-right. Of
/// the two remaining points, the one with the smaller `y - x` is top-right,
/// the other bottom-left.
///
/// The heuristic assumes the sheet is roughly axis-aligned in frame; inputs
/// rotated close to 45 degrees are a known degenerate band and are not
/// special-cased.
pub fn order_corners(points: [Point; 4]) -> SheetCorners {
    let mut by_sum = points;
    by_sum.sort_by(|a, b| (a.x + a.y).total_cmp(&(b.x + b.y)));

    let top_left = by_sum[0];
    let bottom_right = by_sum[3];

    let mut remaining = [by_sum[1], by_sum[2]];
    remaining.sort_by(|a, b| (a.y - a.x).total_cmp(&(b.y - b.x)));
    let top_right = remaining[0];
    let bottom_left = remaining[1];

    SheetCorners {
        top_left,
        top_right,
        bottom_right,
        bottom_left,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_points() -> [Point; 4] {
        [
            Point::new(10.0, 10.0),
            Point::new(90.0, 12.0),
            Point::new(92.0, 70.0),
            Point::new(8.0, 68.0),
        ]
    }

    #[test]
    fn orders_axis_aligned_quad() {
        let corners = order_corners(rect_points());
        assert_eq!(corners.top_left(), Point::new(10.0, 10.0));
        assert_eq!(corners.top_right(), Point::new(90.0, 12.0));
        assert_eq!(corners.bottom_right(), Point::new(92.0, 70.0));
        assert_eq!(corners.bottom_left(), Point::new(8.0, 68.0));
    }

    #[test]
    fn ordering_is_permutation_invariant() {
        let pts = rect_points();
        let reference = order_corners(pts);

        // All 24 permutations of the same four points must agree.
        let idx = [0usize, 1, 2, 3];
        for a in idx {
            for b in idx {
                for c in idx {
                    for d in idx {
                        let mut seen = [false; 4];
                        for i in [a, b, c, d] {
                            seen[i] = true;
                        }
                        if seen != [true; 4] {
                            continue;
                        }
                        let permuted = order_corners([pts[a], pts[b], pts[c], pts[d]]);
                        assert_eq!(permuted, reference);
                    }
                }
            }
        }
    }

    #[test]
    fn max_displacement_is_per_corner() {
        let a = order_corners(rect_points());
        let mut moved = rect_points();
        moved[2] = Point::new(95.0, 74.0);
        let b = order_corners(moved);

        let expected = Point::new(92.0, 70.0).distance_to(Point::new(95.0, 74.0));
        assert!((a.max_displacement(&b) - expected).abs() < 1e-9);
    }
}
