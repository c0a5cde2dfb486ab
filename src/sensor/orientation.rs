use crate::sensor::MotionSample;

/// Confidence contribution constants. Baseline plus one bonus each for a flat
/// and a still device, capped at 1.0.
const BASELINE_CONFIDENCE: f64 = 0.2;
const FLAT_BONUS: f64 = 0.4;
const STILL_BONUS: f64 = 0.4;

/// Fixed confidence in manual-capture mode or when no sensor is available.
pub const MANUAL_CONFIDENCE: f64 = 0.6;

/// Confidence at or above which the auto-capture clock runs.
pub const READY_CONFIDENCE: f64 = 0.9;

/// Orientation fallback tunables.
#[derive(Clone, Debug)]
pub struct OrientationConfig {
    /// Sensor poll interval, milliseconds.
    pub poll_interval_ms: u64,
    /// Both rotation axes must stay within this tolerance (radians) for the
    /// device to count as flat.
    pub flat_tolerance_rad: f64,
    /// Sum of absolute linear-acceleration components below this counts as
    /// still.
    pub still_tolerance: f64,
    /// Confidence must hold at READY_CONFIDENCE for this long before
    /// auto-capture fires.
    pub stability_duration_ms: u64,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            flat_tolerance_rad: 0.4,
            still_tolerance: 0.3,
            stability_duration_ms: 1000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    Auto,
    Manual,
}

/// Outcome of one poll.
#[derive(Clone, Copy, Debug)]
pub struct OrientationDecision {
    pub confidence: f64,
    /// True when the hold window completed and the caller should attempt a
    /// capture (subject to the shared cooldown gate).
    pub wants_capture: bool,
    /// False when the fallback is running on fixed confidence.
    pub sensor_available: bool,
}

/// Orientation confidence fallback.
///
/// Runs alongside the capture state machine on platforms where vision
/// analysis is unavailable. Polled at a fixed interval with the latest motion
/// sample; computes a confidence proxy and drives its own auto-capture hold
/// window. Any dip below READY_CONFIDENCE resets the window; there is no
/// partial credit.
pub struct OrientationMonitor {
    config: OrientationConfig,
    mode: CaptureMode,
    ready_since_ms: Option<u64>,
    confidence: f64,
}

impl OrientationMonitor {
    pub fn new(config: OrientationConfig) -> Self {
        Self {
            config,
            mode: CaptureMode::Auto,
            ready_since_ms: None,
            confidence: 0.0,
        }
    }

    pub fn config(&self) -> &OrientationConfig {
        &self.config
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Switch capture mode. Manual mode pins confidence and clears the hold
    /// window.
    pub fn set_mode(&mut self, mode: CaptureMode) {
        self.mode = mode;
        self.ready_since_ms = None;
        if mode == CaptureMode::Manual {
            self.confidence = MANUAL_CONFIDENCE;
        }
    }

    /// Latest computed confidence, for UI display.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Feed one poll tick. `sample` is `None` when the sensor is unavailable.
    pub fn poll(&mut self, sample: Option<&MotionSample>, now_ms: u64) -> OrientationDecision {
        let sample = match (self.mode, sample) {
            (CaptureMode::Manual, _) | (_, None) => {
                self.confidence = MANUAL_CONFIDENCE;
                self.ready_since_ms = None;
                return OrientationDecision {
                    confidence: MANUAL_CONFIDENCE,
                    wants_capture: false,
                    sensor_available: sample.is_some(),
                };
            }
            (CaptureMode::Auto, Some(sample)) => sample,
        };

        let flat = sample.rotation.beta.abs() < self.config.flat_tolerance_rad
            && sample.rotation.gamma.abs() < self.config.flat_tolerance_rad;
        let still = sample.acceleration.x.abs()
            + sample.acceleration.y.abs()
            + sample.acceleration.z.abs()
            < self.config.still_tolerance;

        let mut confidence = BASELINE_CONFIDENCE;
        if flat {
            confidence += FLAT_BONUS;
        }
        if still {
            confidence += STILL_BONUS;
        }
        self.confidence = confidence.min(1.0);

        let mut wants_capture = false;
        if self.confidence >= READY_CONFIDENCE {
            let since = *self.ready_since_ms.get_or_insert(now_ms);
            if now_ms.saturating_sub(since) >= self.config.stability_duration_ms {
                wants_capture = true;
                self.ready_since_ms = None;
            }
        } else {
            self.ready_since_ms = None;
        }

        OrientationDecision {
            confidence: self.confidence,
            wants_capture,
            sensor_available: true,
        }
    }

    /// Clear the hold window (e.g. after any capture or a session reset).
    pub fn reset(&mut self) {
        self.ready_since_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{Acceleration, MotionSample, Rotation};

    fn flat_still() -> MotionSample {
        MotionSample::default()
    }

    fn tilted() -> MotionSample {
        MotionSample {
            rotation: Rotation {
                beta: 0.9,
                gamma: 0.1,
            },
            acceleration: Acceleration::default(),
        }
    }

    fn shaking() -> MotionSample {
        MotionSample {
            rotation: Rotation::default(),
            acceleration: Acceleration {
                x: 0.2,
                y: 0.2,
                z: 0.1,
            },
        }
    }

    #[test]
    fn confidence_adds_flat_and_still_bonuses() {
        let mut monitor = OrientationMonitor::new(OrientationConfig::default());

        assert!((monitor.poll(Some(&flat_still()), 0).confidence - 1.0).abs() < 1e-9);
        assert!((monitor.poll(Some(&tilted()), 100).confidence - 0.6).abs() < 1e-9);
        assert!((monitor.poll(Some(&shaking()), 200).confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn capture_fires_after_continuous_hold() {
        let mut monitor = OrientationMonitor::new(OrientationConfig::default());

        let mut fired_at = None;
        for tick in 0..=12u64 {
            let now = tick * 100;
            if monitor.poll(Some(&flat_still()), now).wants_capture {
                fired_at = Some(now);
                break;
            }
        }
        // Ready at t=0; the 1000 ms window completes at t=1000.
        assert_eq!(fired_at, Some(1000));
    }

    #[test]
    fn dip_below_ready_resets_the_window() {
        let mut monitor = OrientationMonitor::new(OrientationConfig::default());

        // 0.9+ for 300 ms, then a dip at 400 ms: the window never completes.
        for tick in 0..4u64 {
            assert!(!monitor.poll(Some(&flat_still()), tick * 100).wants_capture);
        }
        assert!(!monitor.poll(Some(&tilted()), 400).wants_capture);

        // Recovers at 500 ms, so the window completes at 1500 ms.
        for tick in 5..=15u64 {
            let now = tick * 100;
            let decision = monitor.poll(Some(&flat_still()), now);
            assert_eq!(decision.wants_capture, now == 1500);
        }
    }

    #[test]
    fn manual_mode_pins_medium_confidence() {
        let mut monitor = OrientationMonitor::new(OrientationConfig::default());
        monitor.set_mode(CaptureMode::Manual);

        let decision = monitor.poll(Some(&flat_still()), 0);
        assert!((decision.confidence - MANUAL_CONFIDENCE).abs() < 1e-9);
        assert!(!decision.wants_capture);
    }

    #[test]
    fn missing_sensor_degrades_to_fixed_confidence() {
        let mut monitor = OrientationMonitor::new(OrientationConfig::default());

        let decision = monitor.poll(None, 0);
        assert!((decision.confidence - MANUAL_CONFIDENCE).abs() < 1e-9);
        assert!(!decision.sensor_available);
        assert!(!decision.wants_capture);
    }
}
