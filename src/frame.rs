//! Frame container.
//!
//! A `Frame` owns a single luma (grayscale) plane plus its dimensions and an
//! arrival timestamp. Everything the detector allocates while processing a
//! frame is an owned value scoped to the call, so intermediate buffers are
//! released on every exit path; nothing survives a `detect` call unless the
//! caller already owned it.

use anyhow::{anyhow, Result};

/// One camera frame, grayscale.
pub struct Frame {
    luma: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Arrival time in milliseconds. Drives the capture-session throttle.
    pub timestamp_ms: u64,
}

impl Frame {
    /// Wrap an existing luma plane. Length must match the dimensions.
    pub fn from_luma(luma: Vec<u8>, width: u32, height: u32, timestamp_ms: u64) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))? as usize;
        if luma.len() != expected {
            return Err(anyhow!(
                "luma plane length mismatch: expected {}, got {}",
                expected,
                luma.len()
            ));
        }
        Ok(Self {
            luma,
            width,
            height,
            timestamp_ms,
        })
    }

    /// Convert an interleaved RGB24 buffer to luma (BT.601 weights).
    pub fn from_rgb(rgb: &[u8], width: u32, height: u32, timestamp_ms: u64) -> Result<Self> {
        let pixels = width
            .checked_mul(height)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))? as usize;
        let expected = pixels
            .checked_mul(3)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if rgb.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                rgb.len()
            ));
        }

        let mut luma = vec![0u8; pixels];
        for (i, px) in rgb.chunks_exact(3).enumerate() {
            let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
            luma[i] = y.round().clamp(0.0, 255.0) as u8;
        }
        Self::from_luma(luma, width, height, timestamp_ms)
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_length_is_validated() {
        assert!(Frame::from_luma(vec![0u8; 11], 3, 4, 0).is_err());
        assert!(Frame::from_luma(vec![0u8; 12], 3, 4, 0).is_ok());
    }

    #[test]
    fn rgb_conversion_produces_gray() {
        let rgb = vec![128u8; 2 * 2 * 3];
        let frame = Frame::from_rgb(&rgb, 2, 2, 0).unwrap();
        assert_eq!(frame.luma(), &[128u8; 4][..]);
    }
}
