//! Frame sources.
//!
//! The pipeline consumes frames; it does not manage camera lifecycle. A
//! [`FrameSource`] yields grayscale [`Frame`]s with arrival timestamps:
//!
//! - `synthetic://...`: deterministic generated scenes (demo and tests)
//! - `file:...`: JPEG/PNG stills from disk, looped
//!
//! A failed `next_frame` is fatal to that frame only; callers skip it and
//! keep the loop running.

mod file;
mod synthetic;

pub use file::FileSource;
pub use synthetic::SyntheticSource;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

/// Per-source counters for health logging.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_produced: u64,
    pub url: String,
}

/// Supplier of camera frames.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Frame>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Build a source from a config URL.
pub fn build_source(url: &str, width: u32, height: u32, fps: u32) -> Result<Box<dyn FrameSource>> {
    if url.starts_with("synthetic://") {
        Ok(Box::new(SyntheticSource::new(url, width, height, fps)))
    } else if let Some(path) = url.strip_prefix("file:") {
        Ok(Box::new(FileSource::new(path)?))
    } else {
        Err(anyhow!(
            "unsupported frame source '{}': expected synthetic:// or file:",
            url
        ))
    }
}
