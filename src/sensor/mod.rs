//! Device motion sensing.
//!
//! Platforms without frame-level vision analysis estimate capture readiness
//! from device tilt and stillness instead. The sensor is a capability: a
//! [`MotionSource`] either yields samples or reports itself unavailable, and
//! absence degrades the fallback to a fixed medium confidence rather than
//! failing.

mod orientation;

pub use orientation::{
    CaptureMode, OrientationConfig, OrientationDecision, OrientationMonitor, MANUAL_CONFIDENCE,
    READY_CONFIDENCE,
};

use anyhow::Result;

/// Device rotation around the two horizontal axes, in radians.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rotation {
    pub beta: f64,
    pub gamma: f64,
}

/// Linear acceleration, gravity removed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One motion sensor reading.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotionSample {
    pub rotation: Rotation,
    pub acceleration: Acceleration,
}

/// Motion sample supplier.
///
/// `sample` returns `Ok(None)` when the sensor is (or has become)
/// unavailable; callers treat that as a degrade signal, not an error.
pub trait MotionSource: Send {
    fn name(&self) -> &'static str;

    fn sample(&mut self) -> Result<Option<MotionSample>>;

    fn is_available(&self) -> bool;
}

/// Motion source for a device resting flat on a table. Used by the demo
/// daemon and tests.
pub struct StillMotionSource;

impl MotionSource for StillMotionSource {
    fn name(&self) -> &'static str {
        "still"
    }

    fn sample(&mut self) -> Result<Option<MotionSample>> {
        Ok(Some(MotionSample::default()))
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Replays a fixed sequence of samples, then reports unavailable. Test aid.
pub struct ScriptedMotionSource {
    samples: std::vec::IntoIter<MotionSample>,
}

impl ScriptedMotionSource {
    pub fn new(samples: Vec<MotionSample>) -> Self {
        Self {
            samples: samples.into_iter(),
        }
    }
}

impl MotionSource for ScriptedMotionSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn sample(&mut self) -> Result<Option<MotionSample>> {
        Ok(self.samples.next())
    }

    fn is_available(&self) -> bool {
        self.samples.len() > 0
    }
}
