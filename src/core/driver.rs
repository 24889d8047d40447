// src/core/driver.rs — Task driver: iterate, retry, persist

use std::time::{Duration, Instant};

use super::aggregate::SelfConsistency;
use super::record::TaskRecord;
use super::retry::RetryPolicy;
use super::types::Task;
use crate::data::log::ResultLog;
use crate::infra::errors::MathselError;

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,
    pub finished: usize,
    pub correct: usize,
    /// Tasks that exhausted their attempts, in dataset order.
    pub unfinished: Vec<Task>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Correct over finished tasks; 0 when nothing finished.
    pub fn accuracy(&self) -> f64 {
        if self.finished == 0 {
            0.0
        } else {
            self.correct as f64 / self.finished as f64
        }
    }
}

/// Processes tasks one at a time. Each finished record is appended to the
/// log before the next task starts.
pub struct TaskDriver {
    aggregator: SelfConsistency,
    policy: RetryPolicy,
}

impl TaskDriver {
    pub fn new(aggregator: SelfConsistency, policy: RetryPolicy) -> Self {
        Self { aggregator, policy }
    }

    /// Run every task. Only fatal errors (and failures to write the log)
    /// end the run early.
    pub async fn run(&self, tasks: &[Task], log: &ResultLog) -> Result<RunSummary, MathselError> {
        let started = Instant::now();
        let mut summary = RunSummary {
            total: tasks.len(),
            ..Default::default()
        };

        for (pos, task) in tasks.iter().enumerate() {
            match self.attempt(task).await? {
                Some(record) => {
                    log.append(&record)?;
                    summary.finished += 1;
                    if record.is_correct {
                        summary.correct += 1;
                    }
                    tracing::info!(
                        task = task.index,
                        progress = format!("{}/{}", pos + 1, tasks.len()),
                        majority = ?record.majority_ans,
                        correct = record.is_correct,
                        "task finished"
                    );
                }
                None => summary.unfinished.push(task.clone()),
            }
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// Try a task up to the policy's attempt budget. `Ok(None)` means the
    /// budget ran out.
    pub async fn attempt(&self, task: &Task) -> Result<Option<TaskRecord>, MathselError> {
        let max = self.policy.max_attempts;
        for attempt in 1..=max {
            match self.aggregator.run_task(task).await {
                Ok(record) => return Ok(Some(record)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        task = task.index,
                        attempt,
                        max,
                        retriable = e.is_retriable(),
                        error = %e,
                        "task attempt failed"
                    );
                    if attempt < max {
                        tokio::time::sleep(self.delay_after(&e)).await;
                    }
                }
            }
        }
        tracing::warn!(task = task.index, attempts = max, "giving up on task");
        Ok(None)
    }

    /// The policy's backoff, stretched to the service's requested wait.
    fn delay_after(&self, error: &MathselError) -> Duration {
        let backoff = self.policy.backoff();
        match error {
            MathselError::RateLimited { retry_after_ms, .. } => {
                backoff.max(Duration::from_millis(*retry_after_ms))
            }
            _ => backoff,
        }
    }
}
