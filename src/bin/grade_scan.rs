//! grade_scan - grade a detected-answers payload against a stored answer key
//!
//! Reads a JSON array of detected answers, grades it against the answer key
//! stored for the exam, and replaces the stored attempt. Can also install or
//! confirm a key. Exit code 2 signals a grading precondition failure (key
//! missing or unconfirmed), distinct from I/O errors.

use anyhow::{anyhow, Result};
use clap::Parser;

use sheetscan::{
    grade, AnswerKey, AnswerKeyEntry, AnswerKeyStore, AttemptStore, DetectedAnswer, GradeError,
    SqliteScanStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the sheetscan database.
    #[arg(long, default_value = "sheetscan.db", env = "SHEETSCAN_DB_PATH")]
    db_path: String,
    /// Exam identifier.
    #[arg(long)]
    exam_id: String,
    /// Student identifier. Required when grading.
    #[arg(long)]
    student_id: Option<String>,
    /// Path to a JSON array of detected answers to grade.
    #[arg(long)]
    answers: Option<String>,
    /// Storage key of the captured image this grading refers to.
    #[arg(long, default_value = "")]
    image_key: String,
    /// Install the JSON array of key entries at this path as the exam's
    /// answer key (unconfirmed unless --confirm-key is also given).
    #[arg(long)]
    set_key: Option<String>,
    /// Confirm the exam's answer key.
    #[arg(long, default_value_t = false)]
    confirm_key: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut store = SqliteScanStore::open(&args.db_path)?;

    if let Some(path) = &args.set_key {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read key file {}: {}", path, e))?;
        let entries: Vec<AnswerKeyEntry> =
            serde_json::from_str(&raw).map_err(|e| anyhow!("invalid key file {}: {}", path, e))?;
        store.put_key(&AnswerKey {
            exam_id: args.exam_id.clone(),
            entries,
            confirmed: args.confirm_key,
        })?;
        log::info!(
            "answer key stored for exam {} ({})",
            args.exam_id,
            if args.confirm_key {
                "confirmed"
            } else {
                "pending confirmation"
            }
        );
    } else if args.confirm_key {
        if !store.confirm_key(&args.exam_id)? {
            return Err(anyhow!("no answer key stored for exam {}", args.exam_id));
        }
        log::info!("answer key confirmed for exam {}", args.exam_id);
    }

    let Some(answers_path) = &args.answers else {
        return Ok(());
    };
    let student_id = args
        .student_id
        .as_deref()
        .ok_or_else(|| anyhow!("--student-id is required when grading"))?;

    let raw = std::fs::read_to_string(answers_path)
        .map_err(|e| anyhow!("failed to read answers file {}: {}", answers_path, e))?;
    let detected: Vec<DetectedAnswer> = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid answers file {}: {}", answers_path, e))?;

    let Some(key) = store.get_key(&args.exam_id)? else {
        eprintln!(
            "key not ready: no answer key stored for exam {}",
            args.exam_id
        );
        std::process::exit(2);
    };

    match grade(&detected, &key) {
        Ok(attempt) => {
            let attempt_id =
                store.replace_attempt(&args.exam_id, student_id, &args.image_key, &attempt)?;
            let message = if attempt.needs_review {
                "graded with low confidence - under review"
            } else {
                "graded successfully"
            };
            println!(
                "attempt {}: {} (score {}, correct {}, incorrect {}, blank {})",
                attempt_id,
                message,
                attempt.score,
                attempt.total_correct,
                attempt.total_incorrect,
                attempt.total_blank
            );
        }
        Err(e @ GradeError::KeyNotReady { .. }) => {
            eprintln!("key not ready: {}", e);
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
