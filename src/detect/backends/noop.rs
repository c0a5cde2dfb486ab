use crate::detect::{DetectorConfig, SheetDetection};
use crate::frame::Frame;

use super::super::backend::SheetDetector;

/// Degraded detector for targets without vision analysis.
///
/// Always reports a non-detection with neutral quality. Sessions running this
/// backend rely on the orientation confidence fallback for capture readiness.
pub struct NoopSheetDetector;

impl NoopSheetDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoopSheetDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetDetector for NoopSheetDetector {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn detect(&mut self, frame: &Frame, _config: &DetectorConfig) -> SheetDetection {
        SheetDetection::none(frame.timestamp_ms)
    }
}
