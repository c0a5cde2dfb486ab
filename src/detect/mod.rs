//! Sheet detection.
//!
//! The detector finds the best quadrilateral candidate in a camera frame and
//! scores it. It knows nothing about camera lifecycle or UI; callers feed it
//! frames and consume [`SheetDetection`] values.

mod backend;
mod backends;
pub(crate) mod raster;
mod result;

pub use backend::{select_detector, SheetDetector};
pub use backends::{CpuSheetDetector, NoopSheetDetector};
pub use result::{FrameQuality, SheetDetection};

use serde::Deserialize;

/// Detector tunables. Supplied once per capture session; immutable while the
/// session runs.
#[derive(Clone, Debug, Deserialize)]
pub struct DetectorConfig {
    /// Frame-processing rate. Frames arriving faster are dropped.
    pub fps: u32,
    /// Minimum contour area as a fraction of frame area.
    pub min_contour_area_ratio: f64,
    /// Maximum contour area as a fraction of frame area.
    pub max_contour_area_ratio: f64,
    /// Polygon approximation tolerance, as a fraction of contour perimeter.
    pub approx_poly_epsilon: f64,
    /// Consecutive stable frames required before capture.
    pub stable_frames_threshold: u32,
    /// Sharpness threshold; frames below it take a confidence penalty.
    pub blur_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fps: 4,
            min_contour_area_ratio: 0.15,
            max_contour_area_ratio: 0.85,
            approx_poly_epsilon: 0.02,
            stable_frames_threshold: 6,
            blur_threshold: 100.0,
        }
    }
}

impl DetectorConfig {
    /// Minimum interval between processed frames, in milliseconds.
    pub fn frame_interval_ms(&self) -> u64 {
        if self.fps == 0 {
            0
        } else {
            1000 / self.fps as u64
        }
    }
}
