//! Capture orchestration.
//!
//! Consumes detector output frame-over-frame, tracks geometric stability,
//! and drives the idle → detecting → stable → captured state machine. The
//! capture cooldown gate is shared with the orientation fallback so a capture
//! from either path suppresses immediate re-fires from both.

mod gate;
mod session;
mod snapshot;
mod stability;

pub use gate::{CaptureGate, DEFAULT_CAPTURE_COOLDOWN_MS};
pub use session::{CaptureSession, CaptureState, FrameDisposition};
pub use snapshot::{snapshot_slot, CaptureSnapshot, SnapshotPublisher, SnapshotReader};
pub use stability::{corners_stable, StabilityTracker, DEFAULT_STABILITY_THRESHOLD_PX};
