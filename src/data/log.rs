// src/data/log.rs — Append-only result log and the unfinished-task log

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::types::Task;
use crate::infra::config::Config;
use crate::infra::errors::MathselError;
use crate::infra::paths;

/// One JSON object per line. Each append opens, writes, flushes and closes,
/// so everything appended survives a crash.
#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    /// Create the parent directory; the file itself appears on first append.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, MathselError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append<T: Serialize>(&self, record: &T) -> Result<(), MathselError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Write tasks that exhausted their retries, plus the run's configuration
/// next to them as `<path>.args`. Nothing is written for an empty list.
pub fn write_unfinished(
    path: &Path,
    tasks: &[Task],
    config: &Config,
) -> Result<Option<PathBuf>, MathselError> {
    if tasks.is_empty() {
        return Ok(None);
    }
    let log = ResultLog::create(path)?;
    for task in tasks {
        log.append(task)?;
    }

    let snapshot = toml::to_string_pretty(config)
        .map_err(|e| MathselError::Other(anyhow::anyhow!("cannot serialize config: {e}")))?;
    let args = paths::args_path(path);
    std::fs::write(&args, snapshot)?;

    tracing::warn!(
        tasks = tasks.len(),
        path = %path.display(),
        "unfinished tasks recorded"
    );
    Ok(Some(args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(i: u64) -> Task {
        Task {
            index: i,
            question: format!("Q{i}"),
            answer: 1.0,
        }
    }

    #[test]
    fn test_append_creates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = ResultLog::create(dir.path().join("gpt4/run.jsonl")).unwrap();
        log.append(&task(0)).unwrap();
        log.append(&task(1)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let back: Task = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(back.index, 1);
    }

    #[test]
    fn test_write_unfinished_with_args() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unfinished/run_unfinished.jsonl");
        let args = write_unfinished(&path, &[task(3)], &Config::default())
            .unwrap()
            .unwrap();
        assert!(path.exists());
        let snapshot = std::fs::read_to_string(args).unwrap();
        let back: Config = toml::from_str(&snapshot).unwrap();
        assert_eq!(back.run.dataset, "gsm8k");
    }

    #[test]
    fn test_write_unfinished_empty_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unfinished/none.jsonl");
        assert!(write_unfinished(&path, &[], &Config::default()).unwrap().is_none());
        assert!(!path.exists());
    }
}
