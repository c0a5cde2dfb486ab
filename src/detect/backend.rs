use crate::detect::{DetectorConfig, SheetDetection};
use crate::frame::Frame;

/// Sheet detector capability.
///
/// The capture pipeline treats detection as a capability, not a concrete
/// implementation: any backend that can turn a frame into a `SheetDetection`
/// is substitutable. A backend is selected once per capture session and never
/// switched per-call.
///
/// `detect` must not fail on the absence of a sheet: no quadrilateral is a
/// normal `detected: false` result. Internal per-frame errors degrade to the
/// same; the session tolerates skipped frames.
pub trait SheetDetector: Send {
    /// Backend identifier for logs and UI indicators.
    fn name(&self) -> &'static str;

    /// Analyze one frame.
    fn detect(&mut self, frame: &Frame, config: &DetectorConfig) -> SheetDetection;
}

/// Pick a detector for the session: the CPU pipeline when vision analysis is
/// available, otherwise the no-op backend (callers pair it with the
/// orientation confidence fallback).
pub fn select_detector(vision_available: bool) -> Box<dyn SheetDetector> {
    if vision_available {
        Box::new(super::CpuSheetDetector::new())
    } else {
        Box::new(super::NoopSheetDetector::new())
    }
}
