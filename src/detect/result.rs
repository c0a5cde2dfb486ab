use serde::{Deserialize, Serialize};

use crate::geometry::SheetCorners;

/// Per-frame sharpness/exposure estimate, reported whether or not a
/// quadrilateral was found.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FrameQuality {
    /// Variance of the Laplacian response (higher = sharper).
    pub blur: f64,
    /// Mean brightness, 0..1.
    pub brightness: f64,
}

impl Default for FrameQuality {
    fn default() -> Self {
        Self {
            blur: 0.0,
            brightness: 0.5,
        }
    }
}

/// Result of analyzing one frame. Produced and discarded every frame, never
/// persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SheetDetection {
    /// Whether a qualifying quadrilateral was found.
    pub detected: bool,
    /// The four corners, canonically ordered; `None` when not detected.
    pub corners: Option<SheetCorners>,
    /// Detection confidence, 0..1. Zero when not detected.
    pub confidence: f64,
    /// Frame quality metrics, valid regardless of detection outcome.
    pub quality: FrameQuality,
    /// Arrival time of the analyzed frame.
    pub timestamp_ms: u64,
}

impl SheetDetection {
    /// A non-detection with neutral quality.
    pub fn none(timestamp_ms: u64) -> Self {
        Self {
            detected: false,
            corners: None,
            confidence: 0.0,
            quality: FrameQuality::default(),
            timestamp_ms,
        }
    }
}
