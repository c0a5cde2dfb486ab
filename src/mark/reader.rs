use anyhow::{anyhow, Result};

use crate::detect::raster;
use crate::grade::{AnswerStatus, DetectedAnswer, ANSWER_LABELS};
use crate::mark::grid::BubbleGrid;

/// Fill ratio at or above which a bubble counts as a deliberate mark.
pub const MARK_DETECTION_THRESHOLD: f64 = 0.65;

/// Fill ratio below which a row counts as blank.
pub const AMBIGUITY_THRESHOLD: f64 = 0.4;

/// A second bubble above `MARK_DETECTION_THRESHOLD * MULTIPLE_MARK_FACTOR`
/// makes the row a multiple-mark.
const MULTIPLE_MARK_FACTOR: f64 = 0.8;

const THRESHOLD_WINDOW: usize = 11;
const THRESHOLD_BIAS: f64 = 2.0;

/// One answer as read off the sheet, with its detection classification.
#[derive(Clone, Debug)]
pub struct ReadAnswer {
    pub question_number: u32,
    pub selected_option: Option<u32>,
    pub selected_label: Option<char>,
    pub confidence_score: f64,
    pub status: AnswerStatus,
}

impl ReadAnswer {
    /// Strip down to the wire/grading shape.
    pub fn to_detected(&self) -> DetectedAnswer {
        DetectedAnswer {
            question_number: self.question_number,
            selected_option: self.selected_option,
            confidence_score: self.confidence_score,
        }
    }
}

/// Result of reading all marks off one sheet image.
#[derive(Clone, Debug)]
pub struct MarkReadResult {
    pub answers: Vec<ReadAnswer>,
    /// Mean per-answer confidence.
    pub confidence: f64,
    pub warnings: Vec<String>,
}

/// Read bubble selections from a perspective-corrected sheet image.
pub fn read_marks(
    luma: &[u8],
    width: u32,
    height: u32,
    total_questions: u32,
    options_per_question: u32,
) -> Result<MarkReadResult> {
    if total_questions == 0 {
        return Err(anyhow!("total_questions must be at least 1"));
    }
    if options_per_question == 0 || options_per_question as usize > ANSWER_LABELS.len() {
        return Err(anyhow!(
            "options_per_question must be in 1..={}",
            ANSWER_LABELS.len()
        ));
    }

    // Binarize: blur, inverse adaptive threshold (marks become foreground),
    // small close to heal pen gaps.
    let blurred = raster::gaussian_blur(luma, width, height);
    let binary = raster::adaptive_threshold_inv(
        &blurred,
        width,
        height,
        THRESHOLD_WINDOW,
        THRESHOLD_BIAS,
    );
    let cleaned = raster::erode(&raster::dilate(&binary, width, height, 2), width, height, 2);

    let grid = BubbleGrid::layout(width, height, total_questions, options_per_question);

    let mut answers = Vec::with_capacity(total_questions as usize);
    let mut warnings = Vec::new();
    let mut confidence_sum = 0.0;

    for question_number in 1..=total_questions {
        let answer = analyze_question(&cleaned, width, height, &grid, question_number);
        confidence_sum += answer.confidence_score;

        match answer.status {
            AnswerStatus::Multiple => warnings.push(format!(
                "question {}: multiple marks detected",
                question_number
            )),
            AnswerStatus::Ambiguous => {
                warnings.push(format!("question {}: ambiguous mark", question_number))
            }
            AnswerStatus::Blank => {
                warnings.push(format!("question {}: no mark detected", question_number))
            }
            AnswerStatus::Detected => {}
        }
        answers.push(answer);
    }

    let confidence = round4(confidence_sum / total_questions as f64);
    Ok(MarkReadResult {
        answers,
        confidence,
        warnings,
    })
}

fn analyze_question(
    binary: &[u8],
    width: u32,
    height: u32,
    grid: &BubbleGrid,
    question_number: u32,
) -> ReadAnswer {
    let mut scores: Vec<(u32, f64)> = (0..grid.options)
        .map(|option| {
            let rect = grid.bubble_rect(question_number, option, width, height);
            let area = (rect.2 - rect.0) * (rect.3 - rect.1);
            let fill = if area == 0 {
                0.0
            } else {
                raster::count_foreground(binary, width, rect) as f64 / area as f64
            };
            (option, fill)
        })
        .collect();
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (best_option, best_fill) = scores[0];
    let second_fill = scores.get(1).map(|&(_, fill)| fill).unwrap_or(0.0);

    if best_fill < AMBIGUITY_THRESHOLD {
        return ReadAnswer {
            question_number,
            selected_option: None,
            selected_label: None,
            confidence_score: round4(1.0 - best_fill),
            status: AnswerStatus::Blank,
        };
    }

    let label = ANSWER_LABELS[best_option as usize];

    if best_fill < MARK_DETECTION_THRESHOLD {
        return ReadAnswer {
            question_number,
            selected_option: Some(best_option),
            selected_label: Some(label),
            confidence_score: round4(best_fill),
            status: AnswerStatus::Ambiguous,
        };
    }

    if second_fill > MARK_DETECTION_THRESHOLD * MULTIPLE_MARK_FACTOR {
        return ReadAnswer {
            question_number,
            selected_option: Some(best_option),
            selected_label: Some(label),
            confidence_score: round4(best_fill - second_fill),
            status: AnswerStatus::Multiple,
        };
    }

    ReadAnswer {
        question_number,
        selected_option: Some(best_option),
        selected_label: Some(label),
        confidence_score: round4((best_fill / MARK_DETECTION_THRESHOLD).min(1.0)),
        status: AnswerStatus::Detected,
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 100;
    const H: u32 = 80;
    const QUESTIONS: u32 = 4;
    const OPTIONS: u32 = 4;

    struct SheetBuilder {
        luma: Vec<u8>,
        grid: BubbleGrid,
    }

    impl SheetBuilder {
        fn new() -> Self {
            Self {
                luma: vec![230u8; (W * H) as usize],
                grid: BubbleGrid::layout(W, H, QUESTIONS, OPTIONS),
            }
        }

        /// Darken a fraction of a bubble cell, centered.
        fn mark(&mut self, question: u32, option: u32, coverage: f64) {
            let (x0, y0, x1, y1) = self.grid.bubble_rect(question, option, W, H);
            let bw = x1 - x0;
            let bh = y1 - y0;
            let mw = (bw as f64 * coverage) as usize;
            let mh = (bh as f64 * coverage) as usize;
            let sx = x0 + (bw - mw) / 2;
            let sy = y0 + (bh - mh) / 2;
            for y in sy..sy + mh {
                for x in sx..sx + mw {
                    self.luma[y * W as usize + x] = 20;
                }
            }
        }

        fn read(&self) -> MarkReadResult {
            read_marks(&self.luma, W, H, QUESTIONS, OPTIONS).unwrap()
        }
    }

    #[test]
    fn full_mark_is_detected() {
        let mut sheet = SheetBuilder::new();
        sheet.mark(1, 2, 1.0);

        let result = sheet.read();
        let answer = &result.answers[0];
        assert_eq!(answer.status, AnswerStatus::Detected);
        assert_eq!(answer.selected_option, Some(2));
        assert_eq!(answer.selected_label, Some('C'));
        assert!(answer.confidence_score > 0.9);
    }

    #[test]
    fn empty_row_is_blank_with_high_confidence() {
        let sheet = SheetBuilder::new();
        let result = sheet.read();

        for answer in &result.answers {
            assert_eq!(answer.status, AnswerStatus::Blank);
            assert_eq!(answer.selected_option, None);
            assert!(answer.confidence_score > 0.9);
        }
        assert_eq!(result.warnings.len(), QUESTIONS as usize);
    }

    #[test]
    fn partial_mark_is_ambiguous() {
        let mut sheet = SheetBuilder::new();
        sheet.mark(2, 1, 0.7);

        let result = sheet.read();
        let answer = &result.answers[1];
        assert_eq!(answer.status, AnswerStatus::Ambiguous);
        assert_eq!(answer.selected_option, Some(1));
        assert!(answer.confidence_score < MARK_DETECTION_THRESHOLD);
    }

    #[test]
    fn two_full_marks_are_multiple() {
        let mut sheet = SheetBuilder::new();
        sheet.mark(3, 0, 1.0);
        sheet.mark(3, 3, 1.0);

        let result = sheet.read();
        let answer = &result.answers[2];
        assert_eq!(answer.status, AnswerStatus::Multiple);
        // Near-equal fills leave almost no confidence margin.
        assert!(answer.confidence_score < 0.3);
        assert!(result
            .warnings
            .iter()
            .any(|warning| warning.contains("multiple")));
    }

    #[test]
    fn rejects_zero_questions() {
        let luma = vec![255u8; 100];
        assert!(read_marks(&luma, 10, 10, 0, 4).is_err());
        assert!(read_marks(&luma, 10, 10, 4, 0).is_err());
        assert!(read_marks(&luma, 10, 10, 4, 11).is_err());
    }
}
