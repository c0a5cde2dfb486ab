use crate::detect::raster;
use crate::detect::{DetectorConfig, FrameQuality, SheetDetection};
use crate::frame::Frame;
use crate::geometry::{order_corners, SheetCorners};

use super::super::backend::SheetDetector;

// Edge-detector thresholds, matched to the reference pipeline.
const EDGE_LOW: f64 = 50.0;
const EDGE_HIGH: f64 = 150.0;

// Confidence formula constants. Preserved exactly for behavioral parity;
// tunable only here.
const AREA_CONFIDENCE_BASELINE: f64 = 0.5;
const BLUR_PENALTY: f64 = 0.7;

// Components smaller than this cannot satisfy any sane area ratio; skipping
// them keeps contour tracing off speckle noise.
const MIN_COMPONENT_PIXELS: usize = 32;

/// CPU sheet detector: the real frame-analysis pipeline.
///
/// Grayscale quality metrics, Gaussian blur, gradient edges, dilation,
/// external contours, polygon approximation, convexity test, canonical corner
/// ordering. Pure function of the frame and config; every intermediate buffer
/// is dropped before the call returns.
pub struct CpuSheetDetector;

impl CpuSheetDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpuSheetDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetDetector for CpuSheetDetector {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, frame: &Frame, config: &DetectorConfig) -> SheetDetection {
        let luma = frame.luma();
        let frame_area = frame.area();
        let min_area = frame_area * config.min_contour_area_ratio;
        let max_area = frame_area * config.max_contour_area_ratio;

        // Quality is reported regardless of whether a sheet is found.
        let quality = FrameQuality {
            blur: raster::laplacian_variance(luma, frame.width, frame.height),
            brightness: raster::mean_brightness(luma),
        };

        let blurred = raster::gaussian_blur(luma, frame.width, frame.height);
        let edges = raster::edge_map(&blurred, frame.width, frame.height, EDGE_LOW, EDGE_HIGH);
        let dilated = raster::dilate(&edges, frame.width, frame.height, 3);

        let contours =
            raster::external_contours(&dilated, frame.width, frame.height, MIN_COMPONENT_PIXELS);

        let mut best: Option<SheetCorners> = None;
        let mut best_area = 0.0f64;
        for contour in &contours {
            let area = raster::polygon_area(contour);
            if area <= min_area || area >= max_area || area <= best_area {
                continue;
            }

            let epsilon = config.approx_poly_epsilon * raster::polygon_perimeter(contour);
            let poly = raster::approx_closed_polygon(contour, epsilon);
            if poly.len() != 4 || !raster::is_convex(&poly) {
                continue;
            }

            best = Some(order_corners([poly[0], poly[1], poly[2], poly[3]]));
            best_area = area;
        }

        let confidence = match &best {
            Some(_) => {
                let area_term = best_area / (frame_area * AREA_CONFIDENCE_BASELINE);
                let blur_term = if quality.blur > config.blur_threshold {
                    1.0
                } else {
                    BLUR_PENALTY
                };
                (area_term * blur_term).min(1.0)
            }
            None => 0.0,
        };

        SheetDetection {
            detected: best.is_some(),
            corners: best,
            confidence,
            quality,
            timestamp_ms: frame.timestamp_ms,
        }
    }
}
