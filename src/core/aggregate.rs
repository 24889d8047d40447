// src/core/aggregate.rs — Self-consistency: repeat, then plurality vote

use super::reconcile::ReconciliationEngine;
use super::record::TaskRecord;
use super::types::Task;
use crate::infra::errors::MathselError;

/// Plurality over exact values. `None` is a candidate like any other; ties
/// go to the value seen first.
pub fn majority_vote(answers: &[Option<f64>]) -> Option<f64> {
    let mut counts: Vec<(Option<f64>, usize)> = Vec::new();
    for answer in answers {
        match counts.iter_mut().find(|(v, _)| v == answer) {
            Some((_, n)) => *n += 1,
            None => counts.push((*answer, 1)),
        }
    }

    let mut best: Option<(Option<f64>, usize)> = None;
    for (value, n) in counts {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((value, n));
        }
    }
    best.and_then(|(value, _)| value)
}

/// Runs the engine `sc_num` times for one task and folds the samples.
pub struct SelfConsistency {
    engine: ReconciliationEngine,
    sc_num: u32,
}

impl SelfConsistency {
    pub fn new(engine: ReconciliationEngine, sc_num: u32) -> Self {
        Self {
            engine,
            sc_num: sc_num.max(1),
        }
    }

    pub fn sc_num(&self) -> u32 {
        self.sc_num
    }

    /// Any sample's error discards the whole task attempt.
    pub async fn run_task(&self, task: &Task) -> Result<TaskRecord, MathselError> {
        let mut samples = Vec::with_capacity(self.sc_num as usize);
        for i in 0..self.sc_num {
            let sample = self.engine.reconcile(task).await?;
            tracing::debug!(
                task = task.index,
                sample = i,
                answer = ?sample.outcome.final_answer,
                method = ?sample.outcome.method_chosen,
                "sample resolved"
            );
            samples.push(sample);
        }
        Ok(TaskRecord::from_samples(
            task,
            self.engine.mode().label(),
            samples,
        ))
    }
}
