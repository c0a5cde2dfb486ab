//! Grading engine.
//!
//! Maps detected bubble selections onto a confirmed answer key, computes the
//! score, and routes low-confidence attempts to manual review. Grading is a
//! pure, stateless computation: regrading the same inputs yields bit-identical
//! output, and the storage boundary replaces all per-question rows rather
//! than patching them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-answer confidence below this flags the item ambiguous and the whole
/// attempt for review. Preserved exactly for behavioral parity.
pub const AMBIGUITY_REVIEW_CUTOFF: f64 = 0.8;

/// Overall scan confidence at or above which a master-sheet scan confirms an
/// answer key without human review.
pub const KEY_ACCEPT_CONFIDENCE: f64 = 0.95;

/// Printable option labels, option index 0 = "A".
pub const ANSWER_LABELS: [char; 10] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J'];

/// Grading precondition failures. Distinct kinds so callers can produce
/// actionable messages instead of silently scoring against a broken key.
#[derive(Debug, Error)]
pub enum GradeError {
    /// The key is missing, empty, or not yet confirmed by a human or an
    /// accepted scan.
    #[error("answer key for exam {exam_id} is not ready for grading")]
    KeyNotReady { exam_id: String },

    /// The key lists the same question twice; grading against it would be
    /// ambiguous.
    #[error("answer key for exam {exam_id} has duplicate entry for question {question_number}")]
    DuplicateKeyEntry {
        exam_id: String,
        question_number: u32,
    },
}

/// One detected answer, as submitted for grading. `selected_option` of `None`
/// means the question was left blank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedAnswer {
    /// 1-based question number.
    pub question_number: u32,
    pub selected_option: Option<u32>,
    pub confidence_score: f64,
}

/// Authoritative correct choice for one question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    pub question_number: u32,
    pub correct_option: u32,
    pub confidence_score: f64,
}

/// Answer key for one exam.
///
/// A key is authoritative only once confirmed, by a human, or automatically
/// when it came from a scan whose own confidence reached
/// [`KEY_ACCEPT_CONFIDENCE`]. Grading against an unconfirmed key is a hard
/// precondition failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerKey {
    pub exam_id: String,
    pub entries: Vec<AnswerKeyEntry>,
    pub confirmed: bool,
}

impl AnswerKey {
    /// Build a key from a scanned master sheet. The detected selection on the
    /// master is the correct option; blank questions are skipped. The key
    /// auto-confirms only when the scan's overall confidence reaches the
    /// accept threshold.
    pub fn from_master_scan(
        exam_id: &str,
        answers: &[DetectedAnswer],
        scan_confidence: f64,
    ) -> Self {
        let entries = answers
            .iter()
            .filter_map(|answer| {
                answer.selected_option.map(|option| AnswerKeyEntry {
                    question_number: answer.question_number,
                    correct_option: option,
                    confidence_score: answer.confidence_score,
                })
            })
            .collect();
        Self {
            exam_id: exam_id.to_string(),
            entries,
            confirmed: scan_confidence >= KEY_ACCEPT_CONFIDENCE,
        }
    }

    /// Human confirmation.
    pub fn confirm(&mut self) {
        self.confirmed = true;
    }

    pub fn is_ready(&self) -> bool {
        self.confirmed && !self.entries.is_empty()
    }
}

/// Detection quality classification for one answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Detected,
    Ambiguous,
    Blank,
    Multiple,
}

impl AnswerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStatus::Detected => "detected",
            AnswerStatus::Ambiguous => "ambiguous",
            AnswerStatus::Blank => "blank",
            AnswerStatus::Multiple => "multiple",
        }
    }
}

/// Per-question grading result row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub question_number: u32,
    pub selected_option: Option<u32>,
    pub is_correct: bool,
    pub status: AnswerStatus,
    pub confidence_score: f64,
}

/// Full grading result for one submitted sheet. Recomputed from scratch on
/// every grading run; resubmission replaces, never merges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradedAttempt {
    pub total_correct: u32,
    pub total_incorrect: u32,
    pub total_blank: u32,
    /// Raw count of correct answers, not rescaled.
    pub score: u32,
    pub needs_review: bool,
    pub answers: Vec<GradedAnswer>,
}

/// Grade a set of detected answers against a confirmed key.
pub fn grade(detected: &[DetectedAnswer], key: &AnswerKey) -> Result<GradedAttempt, GradeError> {
    if !key.is_ready() {
        return Err(GradeError::KeyNotReady {
            exam_id: key.exam_id.clone(),
        });
    }

    let mut correct_by_question = HashMap::with_capacity(key.entries.len());
    for entry in &key.entries {
        if correct_by_question
            .insert(entry.question_number, entry.correct_option)
            .is_some()
        {
            return Err(GradeError::DuplicateKeyEntry {
                exam_id: key.exam_id.clone(),
                question_number: entry.question_number,
            });
        }
    }

    let mut total_correct = 0u32;
    let mut total_incorrect = 0u32;
    let mut total_blank = 0u32;
    let mut needs_review = false;
    let mut answers = Vec::with_capacity(detected.len());

    for answer in detected {
        let correct_option = correct_by_question.get(&answer.question_number).copied();
        let mut is_correct = false;
        let mut status = AnswerStatus::Detected;

        match answer.selected_option {
            None => {
                total_blank += 1;
                status = AnswerStatus::Blank;
            }
            Some(selected) if correct_option == Some(selected) => {
                total_correct += 1;
                is_correct = true;
            }
            Some(_) => {
                total_incorrect += 1;
            }
        }

        // Low confidence flags the item and the attempt regardless of
        // correctness.
        if answer.confidence_score < AMBIGUITY_REVIEW_CUTOFF {
            status = AnswerStatus::Ambiguous;
            needs_review = true;
        }

        answers.push(GradedAnswer {
            question_number: answer.question_number,
            selected_option: answer.selected_option,
            is_correct,
            status,
            confidence_score: answer.confidence_score,
        });
    }

    Ok(GradedAttempt {
        total_correct,
        total_incorrect,
        total_blank,
        score: total_correct,
        needs_review,
        answers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(entries: &[(u32, u32)]) -> AnswerKey {
        AnswerKey {
            exam_id: "exam-1".to_string(),
            entries: entries
                .iter()
                .map(|&(question_number, correct_option)| AnswerKeyEntry {
                    question_number,
                    correct_option,
                    confidence_score: 1.0,
                })
                .collect(),
            confirmed: true,
        }
    }

    fn answer(question_number: u32, selected: Option<u32>, confidence: f64) -> DetectedAnswer {
        DetectedAnswer {
            question_number,
            selected_option: selected,
            confidence_score: confidence,
        }
    }

    #[test]
    fn counts_correct_incorrect_and_blank() {
        // Key 1:A 2:B 3:C; detected A, C, blank.
        let key = key(&[(1, 0), (2, 1), (3, 2)]);
        let detected = [
            answer(1, Some(0), 0.99),
            answer(2, Some(2), 0.95),
            answer(3, None, 0.9),
        ];

        let graded = grade(&detected, &key).unwrap();
        assert_eq!(graded.total_correct, 1);
        assert_eq!(graded.total_incorrect, 1);
        assert_eq!(graded.total_blank, 1);
        assert_eq!(graded.score, 1);
        assert!(!graded.needs_review);
        assert_eq!(graded.answers[2].status, AnswerStatus::Blank);
    }

    #[test]
    fn low_confidence_forces_review_even_when_correct() {
        let key = key(&[(1, 0), (2, 1), (3, 2)]);
        let detected = [
            answer(1, Some(0), 0.5),
            answer(2, Some(1), 0.99),
            answer(3, Some(2), 0.99),
        ];

        let graded = grade(&detected, &key).unwrap();
        assert_eq!(graded.total_correct, 3);
        assert_eq!(graded.total_incorrect, 0);
        assert_eq!(graded.total_blank, 0);
        assert!(graded.needs_review);
        assert_eq!(graded.answers[0].status, AnswerStatus::Ambiguous);
        assert!(graded.answers[0].is_correct);
    }

    #[test]
    fn grading_is_idempotent() {
        let key = key(&[(1, 0), (2, 1), (3, 2)]);
        let detected = [
            answer(1, Some(0), 0.99),
            answer(2, Some(3), 0.7),
            answer(3, None, 0.85),
        ];

        let first = grade(&detected, &key).unwrap();
        let second = grade(&detected, &key).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unconfirmed_key_is_refused() {
        let mut unconfirmed = key(&[(1, 0)]);
        unconfirmed.confirmed = false;

        let err = grade(&[answer(1, Some(0), 1.0)], &unconfirmed).unwrap_err();
        assert!(matches!(err, GradeError::KeyNotReady { .. }));
    }

    #[test]
    fn empty_key_is_refused() {
        let empty = AnswerKey {
            exam_id: "exam-1".to_string(),
            entries: vec![],
            confirmed: true,
        };
        let err = grade(&[answer(1, Some(0), 1.0)], &empty).unwrap_err();
        assert!(matches!(err, GradeError::KeyNotReady { .. }));
    }

    #[test]
    fn duplicate_key_entries_are_rejected() {
        let duplicated = key(&[(1, 0), (1, 1)]);
        let err = grade(&[answer(1, Some(0), 1.0)], &duplicated).unwrap_err();
        assert!(matches!(
            err,
            GradeError::DuplicateKeyEntry {
                question_number: 1,
                ..
            }
        ));
    }

    #[test]
    fn master_scan_confirms_key_only_at_accept_threshold() {
        let answers = [answer(1, Some(0), 0.99), answer(2, None, 0.9)];

        let accepted = AnswerKey::from_master_scan("exam-1", &answers, 0.97);
        assert!(accepted.confirmed);
        // Blank master questions carry no key entry.
        assert_eq!(accepted.entries.len(), 1);

        let pending = AnswerKey::from_master_scan("exam-1", &answers, 0.8);
        assert!(!pending.confirmed);
        assert!(!pending.is_ready());
    }
}
