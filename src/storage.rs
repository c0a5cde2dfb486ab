//! Answer-key and attempt persistence.
//!
//! The grading engine itself is pure; this module owns the replace-all write
//! discipline around it. `replace_attempt` upserts the attempt row, deletes
//! every per-question row, and inserts the new set inside one transaction, so
//! a regrade can never leave residue from an earlier submission and the
//! delete/insert sequence is never interleaved with a concurrent regrade.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::grade::{AnswerKey, AnswerStatus, GradedAnswer, GradedAttempt};

/// Processing outcome stored with an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Completed,
    NeedsReview,
}

impl AttemptStatus {
    pub fn for_attempt(attempt: &GradedAttempt) -> Self {
        if attempt.needs_review {
            AttemptStatus::NeedsReview
        } else {
            AttemptStatus::Completed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Completed => "completed",
            AttemptStatus::NeedsReview => "needs_review",
        }
    }

    fn parse(text: &str) -> Result<Self> {
        match text {
            "completed" => Ok(AttemptStatus::Completed),
            "needs_review" => Ok(AttemptStatus::NeedsReview),
            other => Err(anyhow!("unknown attempt status '{}'", other)),
        }
    }
}

/// One stored attempt with its per-question rows.
#[derive(Clone, Debug)]
pub struct StoredAttempt {
    pub id: i64,
    pub exam_id: String,
    pub student_id: String,
    /// Reference to the captured image (upload key), not the image itself.
    pub image_key: String,
    pub status: AttemptStatus,
    pub attempt: GradedAttempt,
    pub processed_at_s: i64,
}

/// Answer-key persistence boundary.
pub trait AnswerKeyStore {
    /// Insert or fully replace the key for an exam.
    fn put_key(&mut self, key: &AnswerKey) -> Result<()>;

    fn get_key(&mut self, exam_id: &str) -> Result<Option<AnswerKey>>;

    /// Human confirmation. Returns false when no key exists for the exam.
    fn confirm_key(&mut self, exam_id: &str) -> Result<bool>;
}

/// Attempt persistence boundary.
pub trait AttemptStore {
    /// Replace the attempt for `(exam_id, student_id)` wholesale: attempt row
    /// upserted, all prior per-question rows deleted, new rows inserted in one
    /// transaction, no partial states.
    fn replace_attempt(
        &mut self,
        exam_id: &str,
        student_id: &str,
        image_key: &str,
        attempt: &GradedAttempt,
    ) -> Result<i64>;

    fn get_attempt(&mut self, exam_id: &str, student_id: &str) -> Result<Option<StoredAttempt>>;
}

// ----------------------------------------------------------------------------
// SQLite store
// ----------------------------------------------------------------------------

pub struct SqliteScanStore {
    conn: Connection,
}

impl SqliteScanStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS answer_keys (
              exam_id TEXT PRIMARY KEY,
              entries_json TEXT NOT NULL,
              confirmed INTEGER NOT NULL DEFAULT 0,
              updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS attempts (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              exam_id TEXT NOT NULL,
              student_id TEXT NOT NULL,
              image_key TEXT NOT NULL,
              score INTEGER NOT NULL,
              total_correct INTEGER NOT NULL,
              total_incorrect INTEGER NOT NULL,
              total_blank INTEGER NOT NULL,
              status TEXT NOT NULL,
              processed_at INTEGER NOT NULL,
              UNIQUE(exam_id, student_id)
            );

            CREATE TABLE IF NOT EXISTS attempt_answers (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              attempt_id INTEGER NOT NULL REFERENCES attempts(id),
              question_number INTEGER NOT NULL,
              selected_option INTEGER,
              is_correct INTEGER NOT NULL,
              status TEXT NOT NULL,
              confidence_score REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_attempt_answers_attempt
              ON attempt_answers(attempt_id);
            "#,
        )?;
        Ok(())
    }

    fn answer_rows(&self, attempt_id: i64) -> Result<Vec<GradedAnswer>> {
        let mut stmt = self.conn.prepare(
            "SELECT question_number, selected_option, is_correct, status, confidence_score
             FROM attempt_answers WHERE attempt_id = ?1 ORDER BY question_number ASC",
        )?;
        let mut rows = stmt.query(params![attempt_id])?;
        let mut answers = Vec::new();
        while let Some(row) = rows.next()? {
            let status: String = row.get(3)?;
            answers.push(GradedAnswer {
                question_number: row.get(0)?,
                selected_option: row.get(1)?,
                is_correct: row.get(2)?,
                status: parse_answer_status(&status)?,
                confidence_score: row.get(4)?,
            });
        }
        Ok(answers)
    }
}

fn parse_answer_status(text: &str) -> Result<AnswerStatus> {
    match text {
        "detected" => Ok(AnswerStatus::Detected),
        "ambiguous" => Ok(AnswerStatus::Ambiguous),
        "blank" => Ok(AnswerStatus::Blank),
        "multiple" => Ok(AnswerStatus::Multiple),
        other => Err(anyhow!("unknown answer status '{}'", other)),
    }
}

impl AnswerKeyStore for SqliteScanStore {
    fn put_key(&mut self, key: &AnswerKey) -> Result<()> {
        let entries_json = serde_json::to_string(&key.entries)?;
        self.conn.execute(
            r#"
            INSERT INTO answer_keys(exam_id, entries_json, confirmed, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(exam_id) DO UPDATE SET
              entries_json = excluded.entries_json,
              confirmed = excluded.confirmed,
              updated_at = excluded.updated_at
            "#,
            params![key.exam_id, entries_json, key.confirmed, crate::now_s()?],
        )?;
        Ok(())
    }

    fn get_key(&mut self, exam_id: &str) -> Result<Option<AnswerKey>> {
        let row = self
            .conn
            .query_row(
                "SELECT entries_json, confirmed FROM answer_keys WHERE exam_id = ?1",
                params![exam_id],
                |row| {
                    let entries_json: String = row.get(0)?;
                    let confirmed: bool = row.get(1)?;
                    Ok((entries_json, confirmed))
                },
            )
            .optional()?;

        match row {
            Some((entries_json, confirmed)) => Ok(Some(AnswerKey {
                exam_id: exam_id.to_string(),
                entries: serde_json::from_str(&entries_json)?,
                confirmed,
            })),
            None => Ok(None),
        }
    }

    fn confirm_key(&mut self, exam_id: &str) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE answer_keys SET confirmed = 1, updated_at = ?2 WHERE exam_id = ?1",
            params![exam_id, crate::now_s()?],
        )?;
        Ok(updated > 0)
    }
}

impl AttemptStore for SqliteScanStore {
    fn replace_attempt(
        &mut self,
        exam_id: &str,
        student_id: &str,
        image_key: &str,
        attempt: &GradedAttempt,
    ) -> Result<i64> {
        let status = AttemptStatus::for_attempt(attempt);
        let processed_at = crate::now_s()?;

        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO attempts(exam_id, student_id, image_key, score,
                                 total_correct, total_incorrect, total_blank,
                                 status, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(exam_id, student_id) DO UPDATE SET
              image_key = excluded.image_key,
              score = excluded.score,
              total_correct = excluded.total_correct,
              total_incorrect = excluded.total_incorrect,
              total_blank = excluded.total_blank,
              status = excluded.status,
              processed_at = excluded.processed_at
            "#,
            params![
                exam_id,
                student_id,
                image_key,
                attempt.score,
                attempt.total_correct,
                attempt.total_incorrect,
                attempt.total_blank,
                status.as_str(),
                processed_at
            ],
        )?;

        let attempt_id: i64 = tx.query_row(
            "SELECT id FROM attempts WHERE exam_id = ?1 AND student_id = ?2",
            params![exam_id, student_id],
            |row| row.get(0),
        )?;

        // Delete all, then insert all. Never patch individual rows.
        tx.execute(
            "DELETE FROM attempt_answers WHERE attempt_id = ?1",
            params![attempt_id],
        )?;
        for answer in &attempt.answers {
            tx.execute(
                r#"
                INSERT INTO attempt_answers(attempt_id, question_number, selected_option,
                                            is_correct, status, confidence_score)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    attempt_id,
                    answer.question_number,
                    answer.selected_option,
                    answer.is_correct,
                    answer.status.as_str(),
                    answer.confidence_score
                ],
            )?;
        }
        tx.commit()?;

        Ok(attempt_id)
    }

    fn get_attempt(&mut self, exam_id: &str, student_id: &str) -> Result<Option<StoredAttempt>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, image_key, score, total_correct, total_incorrect,
                       total_blank, status, processed_at
                FROM attempts WHERE exam_id = ?1 AND student_id = ?2
                "#,
                params![exam_id, student_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, u32>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, i64>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, image_key, score, correct, incorrect, blank, status, processed_at)) = row
        else {
            return Ok(None);
        };

        let answers = self.answer_rows(id)?;
        let needs_review = AttemptStatus::parse(&status)? == AttemptStatus::NeedsReview;
        Ok(Some(StoredAttempt {
            id,
            exam_id: exam_id.to_string(),
            student_id: student_id.to_string(),
            image_key,
            status: AttemptStatus::parse(&status)?,
            attempt: GradedAttempt {
                total_correct: correct,
                total_incorrect: incorrect,
                total_blank: blank,
                score,
                needs_review,
                answers,
            },
            processed_at_s: processed_at,
        }))
    }
}

// ----------------------------------------------------------------------------
// In-memory store (tests, ephemeral sessions)
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryScanStore {
    keys: Vec<AnswerKey>,
    attempts: Vec<StoredAttempt>,
    next_attempt_id: i64,
}

impl InMemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnswerKeyStore for InMemoryScanStore {
    fn put_key(&mut self, key: &AnswerKey) -> Result<()> {
        self.keys.retain(|existing| existing.exam_id != key.exam_id);
        self.keys.push(key.clone());
        Ok(())
    }

    fn get_key(&mut self, exam_id: &str) -> Result<Option<AnswerKey>> {
        Ok(self
            .keys
            .iter()
            .find(|key| key.exam_id == exam_id)
            .cloned())
    }

    fn confirm_key(&mut self, exam_id: &str) -> Result<bool> {
        match self.keys.iter_mut().find(|key| key.exam_id == exam_id) {
            Some(key) => {
                key.confirmed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl AttemptStore for InMemoryScanStore {
    fn replace_attempt(
        &mut self,
        exam_id: &str,
        student_id: &str,
        image_key: &str,
        attempt: &GradedAttempt,
    ) -> Result<i64> {
        let existing_id = self
            .attempts
            .iter()
            .find(|stored| stored.exam_id == exam_id && stored.student_id == student_id)
            .map(|stored| stored.id);

        let id = match existing_id {
            Some(id) => {
                self.attempts.retain(|stored| stored.id != id);
                id
            }
            None => {
                self.next_attempt_id += 1;
                self.next_attempt_id
            }
        };

        self.attempts.push(StoredAttempt {
            id,
            exam_id: exam_id.to_string(),
            student_id: student_id.to_string(),
            image_key: image_key.to_string(),
            status: AttemptStatus::for_attempt(attempt),
            attempt: attempt.clone(),
            processed_at_s: crate::now_s()?,
        });
        Ok(id)
    }

    fn get_attempt(&mut self, exam_id: &str, student_id: &str) -> Result<Option<StoredAttempt>> {
        Ok(self
            .attempts
            .iter()
            .find(|stored| stored.exam_id == exam_id && stored.student_id == student_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::{grade, AnswerKeyEntry, DetectedAnswer};

    fn confirmed_key() -> AnswerKey {
        AnswerKey {
            exam_id: "exam-1".to_string(),
            entries: vec![
                AnswerKeyEntry {
                    question_number: 1,
                    correct_option: 0,
                    confidence_score: 1.0,
                },
                AnswerKeyEntry {
                    question_number: 2,
                    correct_option: 1,
                    confidence_score: 1.0,
                },
            ],
            confirmed: true,
        }
    }

    fn detected(selected: &[Option<u32>]) -> Vec<DetectedAnswer> {
        selected
            .iter()
            .enumerate()
            .map(|(i, &selected_option)| DetectedAnswer {
                question_number: i as u32 + 1,
                selected_option,
                confidence_score: 0.95,
            })
            .collect()
    }

    #[test]
    fn key_round_trips_through_sqlite() {
        let mut store = SqliteScanStore::open_in_memory().unwrap();
        let mut key = confirmed_key();
        key.confirmed = false;

        store.put_key(&key).unwrap();
        let loaded = store.get_key("exam-1").unwrap().unwrap();
        assert_eq!(loaded, key);

        assert!(store.confirm_key("exam-1").unwrap());
        assert!(store.get_key("exam-1").unwrap().unwrap().confirmed);
        assert!(!store.confirm_key("missing").unwrap());
    }

    #[test]
    fn regrade_replaces_all_rows() {
        let mut store = SqliteScanStore::open_in_memory().unwrap();
        let key = confirmed_key();

        let first = grade(&detected(&[Some(0), Some(3)]), &key).unwrap();
        let id_first = store
            .replace_attempt("exam-1", "student-1", "img-a", &first)
            .unwrap();

        let second = grade(&detected(&[Some(0), Some(1)]), &key).unwrap();
        let id_second = store
            .replace_attempt("exam-1", "student-1", "img-b", &second)
            .unwrap();

        assert_eq!(id_first, id_second);

        let stored = store.get_attempt("exam-1", "student-1").unwrap().unwrap();
        assert_eq!(stored.image_key, "img-b");
        assert_eq!(stored.attempt.score, 2);
        // Exactly the new rows, nothing left over from the first grading.
        assert_eq!(stored.attempt.answers.len(), 2);
        assert!(stored.attempt.answers.iter().all(|a| a.is_correct));
    }

    #[test]
    fn in_memory_store_mirrors_replace_semantics() {
        let mut store = InMemoryScanStore::new();
        let key = confirmed_key();
        store.put_key(&key).unwrap();

        let first = grade(&detected(&[None, Some(3)]), &key).unwrap();
        let id_first = store
            .replace_attempt("exam-1", "student-1", "img-a", &first)
            .unwrap();
        let second = grade(&detected(&[Some(0), Some(1)]), &key).unwrap();
        let id_second = store
            .replace_attempt("exam-1", "student-1", "img-b", &second)
            .unwrap();

        assert_eq!(id_first, id_second);
        let stored = store.get_attempt("exam-1", "student-1").unwrap().unwrap();
        assert_eq!(stored.attempt.total_correct, 2);
        assert_eq!(stored.status, AttemptStatus::Completed);
    }

    #[test]
    fn needs_review_status_is_stored() {
        let mut store = SqliteScanStore::open_in_memory().unwrap();
        let key = confirmed_key();

        let mut answers = detected(&[Some(0), Some(1)]);
        answers[0].confidence_score = 0.5;
        let graded = grade(&answers, &key).unwrap();
        store
            .replace_attempt("exam-1", "student-1", "img-a", &graded)
            .unwrap();

        let stored = store.get_attempt("exam-1", "student-1").unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::NeedsReview);
        assert!(stored.attempt.needs_review);
        assert_eq!(stored.attempt.answers[0].status, AnswerStatus::Ambiguous);
    }
}
