// src/data/dataset.rs — JSONL dataset loading and slicing

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::types::Task;
use crate::infra::errors::MathselError;

/// Named datasets and their file names inside the dataset directory.
const NAMED_DATASETS: &[(&str, &str)] = &[
    ("gsm8k", "gsm8K_test.jsonl"),
    ("dbg", "dbg.jsonl"),
    ("svamp", "svamp.jsonl"),
    ("asdiv", "asdiv.jsonl"),
    ("singleeq", "single_eq.jsonl"),
    ("singleop", "single_op.jsonl"),
    ("singleaddsub", "single_addsub.jsonl"),
    ("multiarith", "multiarith.jsonl"),
];

/// Where a dataset lives: named ones under `dataset_dir`, anything else is
/// taken as a path.
pub fn dataset_path(dataset_dir: &Path, dataset: &str) -> PathBuf {
    NAMED_DATASETS
        .iter()
        .find(|(name, _)| *name == dataset)
        .map(|(_, file)| dataset_dir.join(file))
        .unwrap_or_else(|| PathBuf::from(dataset))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnswerField {
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    index: Option<u64>,
    question: String,
    answer: AnswerField,
}

/// Parse one JSONL document. Blank lines are skipped; a record without an
/// `index` gets its position among records.
pub fn parse_jsonl(content: &str) -> Result<Vec<Task>, MathselError> {
    let mut tasks = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let err = |message: String| MathselError::Dataset {
            line: lineno + 1,
            message,
        };
        let raw: RawRecord = serde_json::from_str(line).map_err(|e| err(e.to_string()))?;
        let answer = match raw.answer {
            AnswerField::Number(n) => n,
            AnswerField::Text(s) => s
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .map_err(|_| err(format!("answer '{s}' is not a number")))?,
        };
        tasks.push(Task {
            index: raw.index.unwrap_or(tasks.len() as u64),
            question: raw.question,
            answer,
        });
    }
    Ok(tasks)
}

pub fn load_jsonl(path: &Path) -> Result<Vec<Task>, MathselError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MathselError::Config(format!("cannot read dataset {}: {e}", path.display()))
    })?;
    let tasks = parse_jsonl(&content)?;
    tracing::info!(path = %path.display(), tasks = tasks.len(), "dataset loaded");
    Ok(tasks)
}

/// The `[start, end)` slice, with `end < 0` or past the length meaning the
/// end. Returns the slice and the effective end.
pub fn slice(tasks: &[Task], start: usize, end: i64) -> (&[Task], usize) {
    let len = tasks.len();
    let end = if end < 0 { len } else { (end as usize).min(len) };
    let start = start.min(end);
    (&tasks[start..end], end)
}
