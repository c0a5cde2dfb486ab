use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceStats};

/// Still-image frame source.
///
/// A single file is replayed on every `next_frame`; a directory is iterated
/// in sorted order and looped. Useful for replaying captured sheets through
/// the live pipeline.
pub struct FileSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    frames_produced: u64,
    url: String,
}

impl FileSource {
    pub fn new(path: &str) -> Result<Self> {
        let root = Path::new(path);
        let mut paths = Vec::new();

        if root.is_dir() {
            for entry in std::fs::read_dir(root)
                .with_context(|| format!("failed to read frame directory {}", root.display()))?
            {
                let entry_path = entry?.path();
                if matches!(
                    entry_path
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(|e| e.to_ascii_lowercase()),
                    Some(ref ext) if ext == "jpg" || ext == "jpeg" || ext == "png"
                ) {
                    paths.push(entry_path);
                }
            }
            paths.sort();
        } else if root.is_file() {
            paths.push(root.to_path_buf());
        }

        if paths.is_empty() {
            return Err(anyhow!("no frames found at {}", root.display()));
        }

        Ok(Self {
            paths,
            cursor: 0,
            frames_produced: 0,
            url: format!("file:{}", path),
        })
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Frame> {
        let path = &self.paths[self.cursor];
        self.cursor = (self.cursor + 1) % self.paths.len();

        let decoded = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_luma8();
        let (width, height) = decoded.dimensions();

        self.frames_produced += 1;
        Frame::from_luma(decoded.into_raw(), width, height, crate::now_ms()?)
    }

    fn is_healthy(&self) -> bool {
        !self.paths.is_empty()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_produced: self.frames_produced,
            url: self.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_an_error() {
        assert!(FileSource::new("/nonexistent/frames").is_err());
    }

    #[test]
    fn single_image_loops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.png");
        let img = image::GrayImage::from_pixel(16, 12, image::Luma([200u8]));
        img.save(&path).unwrap();

        let mut source = FileSource::new(path.to_str().unwrap()).unwrap();
        let a = source.next_frame().unwrap();
        let b = source.next_frame().unwrap();
        assert_eq!(a.width, 16);
        assert_eq!(a.height, 12);
        assert_eq!(a.luma(), b.luma());
        assert_eq!(source.stats().frames_produced, 2);
    }
}
