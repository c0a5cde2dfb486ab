use anyhow::{anyhow, Result};
use nalgebra::{SMatrix, SVector};

use crate::geometry::SheetCorners;

/// 3x3 projective transform.
pub struct Homography {
    h: [f64; 9],
}

impl Homography {
    /// Least-squares-free exact solve from four point correspondences
    /// (src -> dst), h8 fixed to 1.
    pub fn from_pairs(src: &[(f64, f64); 4], dst: &[(f64, f64); 4]) -> Result<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (&(x, y), &(u, v))) in src.iter().zip(dst.iter()).enumerate() {
            let r = i * 2;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or_else(|| anyhow!("degenerate corner configuration"))?;

        Ok(Self {
            h: [h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0],
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let h = &self.h;
        let w = h[6] * x + h[7] * y + h[8];
        ((h[0] * x + h[1] * y + h[2]) / w, (h[3] * x + h[4] * y + h[5]) / w)
    }
}

/// Straighten the sheet region bounded by `corners` into an axis-aligned
/// image. Target dimensions follow the longer of each pair of opposite edges,
/// so the corrected image keeps the sheet's aspect.
pub fn correct_perspective(
    luma: &[u8],
    width: u32,
    height: u32,
    corners: &SheetCorners,
) -> Result<(Vec<u8>, u32, u32)> {
    let tl = corners.top_left();
    let tr = corners.top_right();
    let br = corners.bottom_right();
    let bl = corners.bottom_left();

    let out_w = tl.distance_to(tr).max(bl.distance_to(br)) as u32;
    let out_h = tl.distance_to(bl).max(tr.distance_to(br)) as u32;
    if out_w < 2 || out_h < 2 {
        return Err(anyhow!("corner quadrilateral is degenerate"));
    }

    // Map output pixels back into the source quad, then sample.
    let dst_rect = [
        (0.0, 0.0),
        (out_w as f64 - 1.0, 0.0),
        (out_w as f64 - 1.0, out_h as f64 - 1.0),
        (0.0, out_h as f64 - 1.0),
    ];
    let src_quad = [
        (tl.x, tl.y),
        (tr.x, tr.y),
        (br.x, br.y),
        (bl.x, bl.y),
    ];
    let back_projection = Homography::from_pairs(&dst_rect, &src_quad)?;

    let mut out = vec![0u8; (out_w * out_h) as usize];
    for y in 0..out_h {
        for x in 0..out_w {
            let (sx, sy) = back_projection.apply(x as f64, y as f64);
            out[(y * out_w + x) as usize] = sample_bilinear(luma, width, height, sx, sy);
        }
    }
    Ok((out, out_w, out_h))
}

fn sample_bilinear(luma: &[u8], width: u32, height: u32, x: f64, y: f64) -> u8 {
    let w = width as usize;
    let h = height as usize;
    if x < 0.0 || y < 0.0 || x > (w - 1) as f64 || y > (h - 1) as f64 {
        return 0;
    }

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let top = luma[y0 * w + x0] as f64 * (1.0 - fx) + luma[y0 * w + x1] as f64 * fx;
    let bottom = luma[y1 * w + x0] as f64 * (1.0 - fx) + luma[y1 * w + x1] as f64 * fx;
    (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
}
