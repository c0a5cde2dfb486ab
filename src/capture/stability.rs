use crate::geometry::SheetCorners;

/// Default per-corner displacement tolerance, in pixels.
pub const DEFAULT_STABILITY_THRESHOLD_PX: f64 = 10.0;

/// Whether two consecutive detections describe the same resting sheet: every
/// corner's displacement is at most `threshold` pixels.
///
/// `None` on either side means not stable: a lost detection is never
/// compared against a stale previous one.
pub fn corners_stable(
    current: Option<&SheetCorners>,
    previous: Option<&SheetCorners>,
    threshold: f64,
) -> bool {
    match (current, previous) {
        (Some(current), Some(previous)) => current.max_displacement(previous) <= threshold,
        _ => false,
    }
}

/// Frame-over-frame stability tracker.
///
/// Owns the stable-frame counter that gates capture: incremented on every
/// stable comparison, reset to zero by any unstable or non-detected frame,
/// saturating at the configured threshold. Counting frames rather than wall
/// time makes the stability requirement scale with the processing rate.
pub struct StabilityTracker {
    threshold_px: f64,
    saturation: u32,
    previous: Option<SheetCorners>,
    stable_frames: u32,
}

impl StabilityTracker {
    pub fn new(threshold_px: f64, saturation: u32) -> Self {
        Self {
            threshold_px,
            saturation,
            previous: None,
            stable_frames: 0,
        }
    }

    /// Feed one frame's detection outcome; returns the updated counter.
    pub fn observe(&mut self, corners: Option<&SheetCorners>) -> u32 {
        match corners {
            Some(current) => {
                if corners_stable(Some(current), self.previous.as_ref(), self.threshold_px) {
                    self.stable_frames = (self.stable_frames + 1).min(self.saturation);
                } else {
                    self.stable_frames = 0;
                }
                self.previous = Some(*current);
            }
            None => {
                self.stable_frames = 0;
                self.previous = None;
            }
        }
        self.stable_frames
    }

    pub fn stable_frames(&self) -> u32 {
        self.stable_frames
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.stable_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{order_corners, Point};

    fn corners_at(offset: f64) -> SheetCorners {
        order_corners([
            Point::new(10.0 + offset, 10.0),
            Point::new(90.0 + offset, 10.0),
            Point::new(90.0 + offset, 70.0),
            Point::new(10.0 + offset, 70.0),
        ])
    }

    #[test]
    fn null_sides_are_never_stable() {
        let c = corners_at(0.0);
        assert!(!corners_stable(Some(&c), None, 10.0));
        assert!(!corners_stable(None, Some(&c), 10.0));
        assert!(!corners_stable(None, None, 10.0));
    }

    #[test]
    fn displacement_within_threshold_is_stable() {
        let a = corners_at(0.0);
        let b = corners_at(9.0);
        let c = corners_at(11.0);
        assert!(corners_stable(Some(&b), Some(&a), 10.0));
        assert!(!corners_stable(Some(&c), Some(&a), 10.0));
    }

    #[test]
    fn counter_increases_then_saturates() {
        let mut tracker = StabilityTracker::new(10.0, 6);
        let c = corners_at(0.0);

        // First observation seeds the previous corners; no stable comparison yet.
        assert_eq!(tracker.observe(Some(&c)), 0);
        for expected in 1..=6 {
            assert_eq!(tracker.observe(Some(&c)), expected);
        }
        // Saturates at the threshold.
        assert_eq!(tracker.observe(Some(&c)), 6);
    }

    #[test]
    fn lost_detection_resets_counter() {
        let mut tracker = StabilityTracker::new(10.0, 6);
        let c = corners_at(0.0);
        tracker.observe(Some(&c));
        tracker.observe(Some(&c));
        tracker.observe(Some(&c));
        assert_eq!(tracker.stable_frames(), 2);

        assert_eq!(tracker.observe(None), 0);
        // The next detection is not compared against the stale state.
        assert_eq!(tracker.observe(Some(&c)), 0);
        assert_eq!(tracker.observe(Some(&c)), 1);
    }

    #[test]
    fn jump_resets_counter() {
        let mut tracker = StabilityTracker::new(10.0, 6);
        tracker.observe(Some(&corners_at(0.0)));
        tracker.observe(Some(&corners_at(1.0)));
        assert_eq!(tracker.stable_frames(), 1);

        assert_eq!(tracker.observe(Some(&corners_at(50.0))), 0);
        assert_eq!(tracker.observe(Some(&corners_at(50.0))), 1);
    }
}
