//! UI state hand-off.
//!
//! The frame loop is the single writer of capture state; the UI thread only
//! ever needs the most recent values. The slot is a latest-value-wins
//! hand-off: publishing replaces the previous snapshot, readers clone the
//! current one. No lock is held across threads and readers must treat what
//! they get as an eventually-consistent view, never as synchronous with the
//! frame callback.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::capture::CaptureState;
use crate::detect::FrameQuality;
use crate::geometry::SheetCorners;

/// Snapshot of UI-facing capture state.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CaptureSnapshot {
    pub state: CaptureState,
    pub corners: Option<SheetCorners>,
    pub confidence: f64,
    pub stable_frames: u32,
    pub quality: FrameQuality,
}

/// Create a connected publisher/reader pair.
pub fn snapshot_slot() -> (SnapshotPublisher, SnapshotReader) {
    let slot = Arc::new(Mutex::new(CaptureSnapshot::default()));
    (
        SnapshotPublisher { slot: slot.clone() },
        SnapshotReader { slot },
    )
}

/// Writing side, owned by the frame loop.
#[derive(Clone)]
pub struct SnapshotPublisher {
    slot: Arc<Mutex<CaptureSnapshot>>,
}

impl SnapshotPublisher {
    /// Replace the published snapshot. Fire-and-forget; a poisoned slot
    /// (reader panicked) is ignored rather than propagated into the frame loop.
    pub fn publish(&self, snapshot: CaptureSnapshot) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = snapshot;
        }
    }
}

/// Reading side, for UI/overlay consumers.
#[derive(Clone)]
pub struct SnapshotReader {
    slot: Arc<Mutex<CaptureSnapshot>>,
}

impl SnapshotReader {
    /// The most recently published snapshot.
    pub fn latest(&self) -> CaptureSnapshot {
        self.slot
            .lock()
            .map(|slot| slot.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_latest_published_value() {
        let (publisher, reader) = snapshot_slot();
        assert_eq!(reader.latest().stable_frames, 0);

        publisher.publish(CaptureSnapshot {
            state: CaptureState::Detecting,
            corners: None,
            confidence: 0.4,
            stable_frames: 2,
            quality: FrameQuality::default(),
        });
        publisher.publish(CaptureSnapshot {
            state: CaptureState::Stable,
            corners: None,
            confidence: 0.7,
            stable_frames: 6,
            quality: FrameQuality::default(),
        });

        let latest = reader.latest();
        assert_eq!(latest.state, CaptureState::Stable);
        assert_eq!(latest.stable_frames, 6);
    }

    #[test]
    fn reader_works_across_threads() {
        let (publisher, reader) = snapshot_slot();
        let handle = std::thread::spawn(move || {
            publisher.publish(CaptureSnapshot {
                confidence: 0.9,
                ..CaptureSnapshot::default()
            });
        });
        handle.join().unwrap();
        assert!((reader.latest().confidence - 0.9).abs() < f64::EPSILON);
    }
}
