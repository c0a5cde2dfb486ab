//! sheetscan - OMR capture-and-grade kernel
//!
//! This crate implements the core pipeline for scanning paper answer sheets
//! and grading them against a teacher-confirmed key:
//!
//! detect -> stabilize -> capture -> submit -> grade
//!
//! # Architecture
//!
//! - `detect`: per-frame sheet detection: best quadrilateral candidate,
//!   confidence, frame-quality metrics. Capability-selected backends (cpu or
//!   noop), chosen once per session.
//! - `capture`: frame-over-frame stability tracking and the
//!   idle → detecting → stable → captured state machine, with drop-based
//!   frame throttling and an exactly-once capture trigger.
//! - `sensor`: orientation confidence fallback for targets without vision
//!   analysis, with its own hold window and a capture cooldown shared with
//!   the vision path.
//! - `mark`: bubble-grid reading from a captured sheet: perspective
//!   correction, binarization, fill-ratio analysis.
//! - `grade`: pure grading engine with a distinct key-not-ready error kind
//!   and review routing for low-confidence answers.
//! - `storage`: SQLite/in-memory key and attempt stores with replace-all
//!   write discipline (regrades leave no residue).
//! - `ingest`: frame sources (synthetic scenes, image files).
//!
//! Detection results are ephemeral, produced and discarded every frame.
//! Capture session state lives for one session and resets on retry. Graded
//! attempts are recomputed in full on every submission.

use anyhow::Result;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod capture;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod grade;
pub mod ingest;
pub mod mark;
pub mod sensor;
pub mod storage;

pub use capture::{
    corners_stable, snapshot_slot, CaptureGate, CaptureSession, CaptureSnapshot, CaptureState,
    FrameDisposition, SnapshotPublisher, SnapshotReader, StabilityTracker,
    DEFAULT_CAPTURE_COOLDOWN_MS, DEFAULT_STABILITY_THRESHOLD_PX,
};
pub use config::{ScanConfig, SourceSettings};
pub use detect::{
    select_detector, CpuSheetDetector, DetectorConfig, FrameQuality, NoopSheetDetector,
    SheetDetection, SheetDetector,
};
pub use frame::Frame;
pub use geometry::{order_corners, Point, SheetCorners};
pub use grade::{
    grade, AnswerKey, AnswerKeyEntry, AnswerStatus, DetectedAnswer, GradeError, GradedAnswer,
    GradedAttempt, AMBIGUITY_REVIEW_CUTOFF, KEY_ACCEPT_CONFIDENCE,
};
pub use ingest::{build_source, FileSource, FrameSource, SourceStats, SyntheticSource};
pub use mark::{correct_perspective, read_marks, read_sheet, BubbleGrid, MarkReadResult, ReadAnswer};
pub use sensor::{
    Acceleration, CaptureMode, MotionSample, MotionSource, OrientationConfig,
    OrientationDecision, OrientationMonitor, Rotation, ScriptedMotionSource, StillMotionSource,
};
pub use storage::{
    AnswerKeyStore, AttemptStatus, AttemptStore, InMemoryScanStore, SqliteScanStore, StoredAttempt,
};

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64)
}

/// Wall-clock seconds since the Unix epoch.
pub fn now_s() -> Result<i64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}
