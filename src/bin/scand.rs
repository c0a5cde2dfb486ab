//! scand - OMR capture pipeline daemon
//!
//! This daemon:
//! 1. Ingests frames from the configured source (synthetic scene or files)
//! 2. Runs sheet detection on each frame (cpu backend, or noop when vision
//!    analysis is disabled)
//! 3. Feeds detections through the capture state machine
//! 4. Runs the orientation confidence fallback when vision is unavailable
//! 5. On capture: reads bubble marks, grades against the stored answer key,
//!    and replaces the stored attempt
//!
//! Grading outcomes are logged explicitly, distinguishing "key not ready"
//! from "needs review" from "graded".

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sheetscan::{
    build_source, grade, now_ms, read_sheet, select_detector, snapshot_slot, AnswerKeyStore,
    AttemptStore, CaptureGate, CaptureSession, Frame, FrameDisposition, GradeError,
    MotionSource, OrientationMonitor, ScanConfig, SheetDetection, SqliteScanStore,
    StillMotionSource,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = ScanConfig::load()?;
    let exam_id = std::env::var("SHEETSCAN_EXAM_ID").unwrap_or_else(|_| "exam-demo".into());
    let student_id =
        std::env::var("SHEETSCAN_STUDENT_ID").unwrap_or_else(|_| "student-demo".into());
    let total_questions: u32 = std::env::var("SHEETSCAN_QUESTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);
    let options_per_question: u32 = std::env::var("SHEETSCAN_OPTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let mut store = SqliteScanStore::open(&cfg.db_path)?;
    let mut source = build_source(
        &cfg.source.url,
        cfg.source.width,
        cfg.source.height,
        cfg.detector.fps,
    )?;
    let mut detector = select_detector(!cfg.vision_disabled);

    let (publisher, snapshots) = snapshot_slot();
    let mut session =
        CaptureSession::new(cfg.detector.clone(), cfg.stability_threshold_px).with_publisher(publisher);
    let mut gate = CaptureGate::new(cfg.capture_cooldown_ms);

    // Orientation fallback runs alongside the state machine when the noop
    // detector is selected.
    let mut motion: Option<Box<dyn MotionSource>> = cfg
        .vision_disabled
        .then(|| Box::new(StillMotionSource) as Box<dyn MotionSource>);
    let mut monitor = OrientationMonitor::new(cfg.sensor.clone());
    let mut last_poll = Instant::now();

    let mut last_health_log = Instant::now();
    let mut capture_count = 0u64;

    log::info!("scand running. writing to {}", cfg.db_path);
    log::info!(
        "detector={} source={} fps={} stable_frames_threshold={}",
        detector.name(),
        cfg.source.url,
        cfg.detector.fps,
        cfg.detector.stable_frames_threshold
    );
    if cfg.vision_disabled {
        log::info!("vision analysis disabled; orientation fallback active");
    }

    while running.load(Ordering::SeqCst) {
        // A failed frame is fatal to that frame only.
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("frame skipped: {}", e);
                continue;
            }
        };

        let detection = detector.detect(&frame, &cfg.detector);
        let disposition = session.process_frame(&detection);

        if disposition == FrameDisposition::Capture {
            if gate.try_fire(now_ms()?) {
                capture_count += 1;
                handle_capture(
                    &mut store,
                    &frame,
                    &detection,
                    &exam_id,
                    &student_id,
                    total_questions,
                    options_per_question,
                )?;
            } else {
                log::debug!("capture suppressed by cooldown");
            }
            // One capture per session; reset for the next sheet.
            session.reset();
            monitor.reset();
        }

        if let Some(motion_source) = motion.as_mut() {
            if last_poll.elapsed() >= Duration::from_millis(cfg.sensor.poll_interval_ms) {
                last_poll = Instant::now();
                let sample = motion_source.sample()?;
                let decision = monitor.poll(sample.as_ref(), now_ms()?);
                if !decision.sensor_available {
                    log::debug!("motion sensor unavailable; fixed confidence");
                }
                if decision.wants_capture && gate.try_fire(now_ms()?) {
                    capture_count += 1;
                    handle_capture(
                        &mut store,
                        &frame,
                        &detection,
                        &exam_id,
                        &student_id,
                        total_questions,
                        options_per_question,
                    )?;
                    session.reset();
                }
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = source.stats();
            let snapshot = snapshots.latest();
            log::info!(
                "source health={} frames={} state={} stable_frames={} confidence={:.2} captures={}",
                source.is_healthy(),
                stats.frames_produced,
                snapshot.state,
                snapshot.stable_frames,
                snapshot.confidence,
                capture_count
            );
            last_health_log = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(cfg.detector.frame_interval_ms().min(100)));
    }

    log::info!("scand stopping after {} captures", capture_count);
    Ok(())
}

/// Submit a captured sheet: read marks, grade, persist. The image itself is
/// handed off by reference (content hash); upload is a collaborator concern.
fn handle_capture(
    store: &mut SqliteScanStore,
    frame: &Frame,
    detection: &SheetDetection,
    exam_id: &str,
    student_id: &str,
    total_questions: u32,
    options_per_question: u32,
) -> Result<()> {
    let image_key = hex::encode(Sha256::digest(frame.luma()));
    log::info!("captured sheet image {}", &image_key[..12]);

    let read = read_sheet(
        frame.luma(),
        frame.width,
        frame.height,
        detection.corners.as_ref(),
        total_questions,
        options_per_question,
    )?;
    for warning in &read.warnings {
        log::debug!("mark reader: {}", warning);
    }

    let detected: Vec<_> = read.answers.iter().map(|a| a.to_detected()).collect();

    let Some(key) = store.get_key(exam_id)? else {
        log::warn!(
            "key not ready: no answer key stored for exam {}; attempt not graded",
            exam_id
        );
        return Ok(());
    };

    match grade(&detected, &key) {
        Ok(attempt) => {
            let attempt_id = store.replace_attempt(exam_id, student_id, &image_key, &attempt)?;
            if attempt.needs_review {
                log::warn!(
                    "attempt {} graded with low confidence - under review (score {}, correct {}, incorrect {}, blank {})",
                    attempt_id,
                    attempt.score,
                    attempt.total_correct,
                    attempt.total_incorrect,
                    attempt.total_blank
                );
            } else {
                log::info!(
                    "attempt {} graded successfully (score {}, correct {}, incorrect {}, blank {})",
                    attempt_id,
                    attempt.score,
                    attempt.total_correct,
                    attempt.total_incorrect,
                    attempt.total_blank
                );
            }
        }
        Err(e @ GradeError::KeyNotReady { .. }) => {
            log::warn!("key not ready: {}; attempt not graded", e);
        }
        Err(e) => {
            log::error!("grading failed: {}", e);
        }
    }
    Ok(())
}
