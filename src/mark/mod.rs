//! Bubble-mark reading.
//!
//! Turns a captured sheet image into detected answers: perspective-correct
//! the region inside the detected corners, binarize, and score the fill
//! ratio of every bubble cell against the detection thresholds.

mod grid;
mod reader;
mod warp;

pub use grid::BubbleGrid;
pub use reader::{
    read_marks, MarkReadResult, ReadAnswer, AMBIGUITY_THRESHOLD, MARK_DETECTION_THRESHOLD,
};
pub use warp::{correct_perspective, Homography};

use anyhow::Result;

use crate::geometry::SheetCorners;

/// Read a full sheet: straighten by `corners` when available, then read the
/// bubble grid.
pub fn read_sheet(
    luma: &[u8],
    width: u32,
    height: u32,
    corners: Option<&SheetCorners>,
    total_questions: u32,
    options_per_question: u32,
) -> Result<MarkReadResult> {
    match corners {
        Some(corners) => {
            let (warped, warped_w, warped_h) = correct_perspective(luma, width, height, corners)?;
            read_marks(
                &warped,
                warped_w,
                warped_h,
                total_questions,
                options_per_question,
            )
        }
        None => read_marks(luma, width, height, total_questions, options_per_question),
    }
}
