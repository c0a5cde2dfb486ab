use serde::Serialize;

use crate::capture::snapshot::{CaptureSnapshot, SnapshotPublisher};
use crate::capture::stability::StabilityTracker;
use crate::detect::{DetectorConfig, SheetDetection};
use crate::geometry::SheetCorners;

/// Capture session state. One instance per active session; transitions happen
/// only inside [`CaptureSession::process_frame`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    #[default]
    Idle,
    Detecting,
    Stable,
    Captured,
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CaptureState::Idle => "idle",
            CaptureState::Detecting => "detecting",
            CaptureState::Stable => "stable",
            CaptureState::Captured => "captured",
        };
        f.write_str(label)
    }
}

/// What `process_frame` did with a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Dropped by the rate throttle; no state was touched.
    Throttled,
    /// Processed; no capture this frame.
    Observed,
    /// Processed and the capture action must fire now, exactly once.
    Capture,
}

/// Capture state machine.
///
/// Orchestrates idle → detecting → stable → captured and fires the capture
/// action exactly once per stable episode. Frames are mutated only by the
/// caller's frame loop (single writer); UI state goes out through the
/// snapshot slot as eventually-consistent copies.
///
/// Throttling is drop-based: a frame arriving less than `1000/fps` ms after
/// the last processed frame is discarded without touching any state. Frames
/// are never queued.
pub struct CaptureSession {
    config: DetectorConfig,
    tracker: StabilityTracker,
    state: CaptureState,
    last_processed_ms: Option<u64>,
    capture_fired: bool,
    publisher: Option<SnapshotPublisher>,
}

impl CaptureSession {
    pub fn new(config: DetectorConfig, stability_threshold_px: f64) -> Self {
        let tracker = StabilityTracker::new(stability_threshold_px, config.stable_frames_threshold);
        Self {
            config,
            tracker,
            state: CaptureState::Idle,
            last_processed_ms: None,
            capture_fired: false,
            publisher: None,
        }
    }

    /// Attach a snapshot publisher for UI-facing state.
    pub fn with_publisher(mut self, publisher: SnapshotPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn stable_frames(&self) -> u32 {
        self.tracker.stable_frames()
    }

    /// Feed one detection result from the frame callback.
    pub fn process_frame(&mut self, detection: &SheetDetection) -> FrameDisposition {
        if let Some(last) = self.last_processed_ms {
            if detection.timestamp_ms.saturating_sub(last) < self.config.frame_interval_ms() {
                return FrameDisposition::Throttled;
            }
        }
        self.last_processed_ms = Some(detection.timestamp_ms);

        let disposition = if detection.detected && detection.corners.is_some() {
            if self.state == CaptureState::Idle {
                self.state = CaptureState::Detecting;
            }

            let stable_frames = self.tracker.observe(detection.corners.as_ref());
            if stable_frames >= self.config.stable_frames_threshold
                && matches!(self.state, CaptureState::Detecting | CaptureState::Stable)
            {
                self.state = CaptureState::Stable;
            }

            if self.state == CaptureState::Stable && !self.capture_fired {
                // Guard flag: additional stable frames processed before the
                // caller resets cannot re-fire the capture action.
                self.capture_fired = true;
                self.state = CaptureState::Captured;
                FrameDisposition::Capture
            } else {
                FrameDisposition::Observed
            }
        } else {
            self.tracker.observe(None);
            if self.state != CaptureState::Captured {
                self.state = CaptureState::Idle;
            }
            FrameDisposition::Observed
        };

        self.publish(detection.corners, detection.confidence, detection.quality);
        disposition
    }

    /// Cancel the session: clear counters, cached corners, and the capture
    /// guard, returning to idle. Safe to call from any state.
    pub fn reset(&mut self) {
        self.state = CaptureState::Idle;
        self.tracker.reset();
        self.last_processed_ms = None;
        self.capture_fired = false;
        if let Some(publisher) = &self.publisher {
            publisher.publish(CaptureSnapshot::default());
        }
    }

    fn publish(
        &self,
        corners: Option<SheetCorners>,
        confidence: f64,
        quality: crate::detect::FrameQuality,
    ) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(CaptureSnapshot {
                state: self.state,
                corners,
                confidence,
                stable_frames: self.tracker.stable_frames(),
                quality,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::snapshot::snapshot_slot;
    use crate::capture::stability::DEFAULT_STABILITY_THRESHOLD_PX;
    use crate::detect::FrameQuality;
    use crate::geometry::{order_corners, Point};

    fn detection(timestamp_ms: u64, detected: bool) -> SheetDetection {
        let corners = detected.then(|| {
            order_corners([
                Point::new(10.0, 10.0),
                Point::new(90.0, 10.0),
                Point::new(90.0, 70.0),
                Point::new(10.0, 70.0),
            ])
        });
        SheetDetection {
            detected,
            corners,
            confidence: if detected { 0.8 } else { 0.0 },
            quality: FrameQuality::default(),
            timestamp_ms,
        }
    }

    fn session() -> CaptureSession {
        CaptureSession::new(DetectorConfig::default(), DEFAULT_STABILITY_THRESHOLD_PX)
    }

    #[test]
    fn first_detection_enters_detecting() {
        let mut session = session();
        assert_eq!(session.state(), CaptureState::Idle);

        session.process_frame(&detection(0, true));
        assert_eq!(session.state(), CaptureState::Detecting);

        session.process_frame(&detection(250, false));
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[test]
    fn capture_fires_exactly_once_for_a_stable_episode() {
        let mut session = session();
        let mut captures = 0;

        // Default config: threshold 6 stable comparisons at 4 fps.
        for i in 0..12u64 {
            if session.process_frame(&detection(i * 250, true)) == FrameDisposition::Capture {
                captures += 1;
            }
        }

        assert_eq!(captures, 1);
        assert_eq!(session.state(), CaptureState::Captured);
    }

    #[test]
    fn captured_is_terminal_until_reset() {
        let mut session = session();
        for i in 0..8u64 {
            session.process_frame(&detection(i * 250, true));
        }
        assert_eq!(session.state(), CaptureState::Captured);

        // Neither lost detection nor further stable frames leave captured.
        session.process_frame(&detection(8 * 250, false));
        assert_eq!(session.state(), CaptureState::Captured);
        let disposition = session.process_frame(&detection(9 * 250, true));
        assert_eq!(disposition, FrameDisposition::Observed);
        assert_eq!(session.state(), CaptureState::Captured);

        session.reset();
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(session.stable_frames(), 0);
    }

    #[test]
    fn reset_allows_a_new_capture_episode() {
        let mut session = session();
        for i in 0..8u64 {
            session.process_frame(&detection(i * 250, true));
        }
        session.reset();

        let mut captures = 0;
        for i in 10..20u64 {
            if session.process_frame(&detection(i * 250, true)) == FrameDisposition::Capture {
                captures += 1;
            }
        }
        assert_eq!(captures, 1);
    }

    #[test]
    fn throttle_drops_fast_frames_without_state_changes() {
        let mut session = session();
        session.process_frame(&detection(0, true));
        let frames_before = session.stable_frames();

        // 4 fps -> 250 ms interval; a frame 100 ms later is dropped.
        let disposition = session.process_frame(&detection(100, true));
        assert_eq!(disposition, FrameDisposition::Throttled);
        assert_eq!(session.stable_frames(), frames_before);

        let disposition = session.process_frame(&detection(250, true));
        assert_eq!(disposition, FrameDisposition::Observed);
    }

    #[test]
    fn snapshots_track_state_for_the_ui() {
        let (publisher, reader) = snapshot_slot();
        let mut session = CaptureSession::new(
            DetectorConfig::default(),
            DEFAULT_STABILITY_THRESHOLD_PX,
        )
        .with_publisher(publisher);

        session.process_frame(&detection(0, true));
        let snap = reader.latest();
        assert_eq!(snap.state, CaptureState::Detecting);
        assert!(snap.corners.is_some());
        assert!((snap.confidence - 0.8).abs() < f64::EPSILON);

        session.reset();
        assert_eq!(reader.latest().state, CaptureState::Idle);
    }
}
