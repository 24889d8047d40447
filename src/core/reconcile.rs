// src/core/reconcile.rs — Reconciliation engine: one sample, one final answer
//
// A closed set of modes, each carrying only what it needs. `reconcile`
// matches on the mode once; every branch ends in exactly one outcome.

use rand::Rng;

use super::strategy::StrategyRunner;
use super::types::*;
use crate::evaluator::extract_numeric_answer;
use crate::evaluator::parser::parse_method_name;
use crate::infra::errors::MathselError;
use crate::prompts::template::{CritiqueTemplate, TextTemplate};

#[derive(Debug, Clone)]
pub enum ReconciliationMode {
    /// Run one strategy; its answer is final.
    Single { method: Method },
    /// CoT plus `second` (PAL or P2C); a tie-break prompt settles disagreement.
    ModelSelection { second: Method },
    /// A router picks the one strategy to run.
    ActorSelection {
        router: TextTemplate,
        inject_hint: bool,
    },
    /// Run CoT and PAL (and P2C when `three_way`); critique only on conflict.
    Critique {
        prompt: CritiqueTemplate,
        three_way: bool,
    },
    /// Issue the critique prompt with no strategy runs.
    DirectCritique { prompt: CritiqueTemplate },
    /// CoT and PAL; the router settles disagreement.
    ConflictActorSelection {
        router: TextTemplate,
        three_way: bool,
    },
}

impl ReconciliationMode {
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationMode::Single { .. } => "single",
            ReconciliationMode::ModelSelection { .. } => "model_selection",
            ReconciliationMode::ActorSelection { .. } => "actor_selection",
            ReconciliationMode::Critique { .. } => "critique",
            ReconciliationMode::DirectCritique { .. } => "direct_critique",
            ReconciliationMode::ConflictActorSelection { .. } => "conflict_actor_selection",
        }
    }
}

/// The value every present answer agrees on within tolerance, if any.
/// All-absent is not concordant.
pub fn concordant_answer(answers: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = answers.iter().flatten().copied().collect();
    let first = *present.first()?;
    let agree = present
        .iter()
        .enumerate()
        .all(|(i, a)| present[i + 1..].iter().all(|b| answer_gap(*a, *b) <= ANSWER_TOLERANCE));
    agree.then_some(first)
}

fn coin_flip() -> Method {
    if rand::thread_rng().gen_bool(0.5) {
        Method::Cot
    } else {
        Method::Pal
    }
}

pub struct ReconciliationEngine {
    runner: StrategyRunner,
    mode: ReconciliationMode,
}

impl ReconciliationEngine {
    pub fn new(runner: StrategyRunner, mode: ReconciliationMode) -> Self {
        Self { runner, mode }
    }

    pub fn mode(&self) -> &ReconciliationMode {
        &self.mode
    }

    /// Resolve one sample for `task`. Completion failures abort the sample
    /// with an error; everything else ends in an outcome.
    pub async fn reconcile(&self, task: &Task) -> Result<Sample, MathselError> {
        match &self.mode {
            ReconciliationMode::Single { method } => self.single(task, *method).await,
            ReconciliationMode::ModelSelection { second } => {
                self.model_selection(task, *second).await
            }
            ReconciliationMode::ActorSelection {
                router,
                inject_hint,
            } => self.actor_selection(task, router, *inject_hint).await,
            ReconciliationMode::Critique { prompt, three_way } => {
                self.conflict_critique(task, prompt, *three_way).await
            }
            ReconciliationMode::DirectCritique { prompt } => {
                let outcome = self.critique_repair(task, prompt, &[]).await?;
                Ok(Sample {
                    results: Vec::new(),
                    outcome,
                })
            }
            ReconciliationMode::ConflictActorSelection { router, three_way } => {
                if *three_way {
                    return Err(MathselError::NotImplemented(
                        "actor selection among three conflicting strategies".into(),
                    ));
                }
                self.conflict_actor_selection(task, router).await
            }
        }
    }

    async fn single(&self, task: &Task, method: Method) -> Result<Sample, MathselError> {
        let result = self.runner.run(method, task, None).await?;
        let outcome = ReconciliationOutcome {
            final_answer: result.parsed_answer,
            method_chosen: Some(method),
            ..Default::default()
        };
        Ok(Sample {
            results: vec![result],
            outcome,
        })
    }

    async fn model_selection(&self, task: &Task, second: Method) -> Result<Sample, MathselError> {
        let cot = self.runner.run_cot(task, None).await?;
        let program = self.runner.run(second, task, None).await?;

        let mut outcome = ReconciliationOutcome::default();
        match (cot.parsed_answer, program.parsed_answer) {
            (Some(a), Some(b)) if answer_gap(a, b) > ANSWER_TOLERANCE => {
                let call = self.runner.select(task, &cot, &program).await?;
                (outcome.final_answer, outcome.method_chosen) = match call.parsed {
                    Some(Choice::A) => (Some(a), Some(Method::Cot)),
                    Some(Choice::B) => (Some(b), Some(second)),
                    None => (None, None),
                };
                outcome.selection_trace = Some(SelectionTrace::Choice {
                    raw: call.raw,
                    choice: call.parsed,
                    prompt: call.prompt,
                });
            }
            (Some(a), _) => {
                outcome.final_answer = Some(a);
                outcome.method_chosen = Some(Method::Cot);
            }
            (None, Some(b)) => {
                outcome.final_answer = Some(b);
                outcome.method_chosen = Some(second);
            }
            (None, None) => {}
        }

        Ok(Sample {
            results: vec![cot, program],
            outcome,
        })
    }

    async fn actor_selection(
        &self,
        task: &Task,
        router: &TextTemplate,
        inject_hint: bool,
    ) -> Result<Sample, MathselError> {
        let call = self.runner.route(router, task).await?;
        let decision = call.parsed.clone();
        let trace = SelectionTrace::Router {
            raw: call.raw,
            decision: call.parsed,
            prompt: call.prompt,
        };

        let Some(method) = decision.method else {
            tracing::warn!(task = task.index, "router output unparseable, no strategy run");
            return Ok(Sample {
                results: Vec::new(),
                outcome: ReconciliationOutcome {
                    selection_trace: Some(trace),
                    ..Default::default()
                },
            });
        };

        let hint = inject_hint.then_some(decision.hint.as_str());
        let result = self.runner.run(method, task, hint).await?;
        let outcome = ReconciliationOutcome {
            final_answer: result.parsed_answer,
            method_chosen: Some(method),
            selection_trace: Some(trace),
            repair_info: None,
        };
        Ok(Sample {
            results: vec![result],
            outcome,
        })
    }

    async fn run_conflict_set(
        &self,
        task: &Task,
        three_way: bool,
    ) -> Result<Vec<StrategyResult>, MathselError> {
        let mut results = vec![
            self.runner.run_cot(task, None).await?,
            self.runner.run_pal(task, None).await?,
        ];
        if three_way {
            results.push(self.runner.run_plan_code(task, None).await?);
        }
        Ok(results)
    }

    async fn conflict_critique(
        &self,
        task: &Task,
        prompt: &CritiqueTemplate,
        three_way: bool,
    ) -> Result<Sample, MathselError> {
        let results = self.run_conflict_set(task, three_way).await?;
        let answers: Vec<Option<f64>> = results.iter().map(|r| r.parsed_answer).collect();

        if let Some(shared) = concordant_answer(&answers) {
            let (agreed, disagreed): (Vec<_>, Vec<_>) = results.iter().partition(|r| {
                r.parsed_answer
                    .is_some_and(|a| answer_gap(a, shared) <= ANSWER_TOLERANCE)
            });
            let agreed: Vec<Method> = agreed.into_iter().map(|r| r.method).collect();
            let outcome = ReconciliationOutcome {
                final_answer: Some(shared),
                method_chosen: agreed.first().copied(),
                selection_trace: None,
                repair_info: Some(RepairInfo::Concordant {
                    agreed,
                    disagreed: disagreed.into_iter().map(|r| r.method).collect(),
                }),
            };
            return Ok(Sample { results, outcome });
        }

        let outcome = self.critique_repair(task, prompt, &results).await?;
        Ok(Sample { results, outcome })
    }

    /// Issue the critique prompt and re-derive the answer from the solution
    /// it names. `earlier` holds this sample's strategy results, if any, for
    /// the before/after record.
    async fn critique_repair(
        &self,
        task: &Task,
        prompt: &CritiqueTemplate,
        earlier: &[StrategyResult],
    ) -> Result<ReconciliationOutcome, MathselError> {
        let call = self.runner.critique(prompt, task).await?;

        let Some(block) = call.parsed else {
            let outcome = ReconciliationOutcome {
                repair_info: Some(RepairInfo::Critique {
                    raw_output: call.raw,
                    prompt: call.prompt,
                    failed_method: None,
                    good_method: None,
                    actual_method: None,
                    hint: None,
                    good_solution: None,
                    reattempt: None,
                }),
                ..Default::default()
            };
            return Ok(outcome);
        };

        let good_method = block.successful_method.as_deref().and_then(parse_method_name);
        let failed_method = block.failed_method.as_deref().and_then(parse_method_name);
        let solution = block.solution.clone().unwrap_or_default();

        let (final_answer, actual_method) = match good_method {
            None => {
                tracing::warn!(task = task.index, "critique names no successful method");
                (None, None)
            }
            Some(Method::Cot) => (extract_numeric_answer(&solution), Some(Method::Cot)),
            Some(method) => match self.runner.evaluate_solution(method, &solution).await {
                Some(answer) => (Some(answer), Some(method)),
                None => {
                    tracing::debug!(
                        task = task.index,
                        method = %method,
                        "critique solution did not execute, reading it as text"
                    );
                    (extract_numeric_answer(&solution), Some(Method::Cot))
                }
            },
        };

        let reattempt = good_method.and_then(|m| {
            earlier.iter().find(|r| r.method == m).map(|before| Reattempt {
                method: m,
                answer_before: before.parsed_answer,
                answer_after: final_answer,
                solution_before: Some(before.raw_text.clone()),
                solution_after: Some(solution.clone()),
            })
        });

        let outcome = ReconciliationOutcome {
            final_answer,
            method_chosen: actual_method,
            selection_trace: None,
            repair_info: Some(RepairInfo::Critique {
                raw_output: call.raw,
                prompt: call.prompt,
                failed_method,
                good_method,
                actual_method,
                hint: block.hint,
                good_solution: block.solution,
                reattempt,
            }),
        };
        Ok(outcome)
    }

    async fn conflict_actor_selection(
        &self,
        task: &Task,
        router: &TextTemplate,
    ) -> Result<Sample, MathselError> {
        let results = self.run_conflict_set(task, false).await?;
        let (cot, pal) = (results[0].parsed_answer, results[1].parsed_answer);

        let mut outcome = ReconciliationOutcome::default();
        match (cot, pal) {
            (Some(a), Some(b)) if answer_gap(a, b) >= ANSWER_TOLERANCE => {
                let call = self.runner.route(router, task).await?;
                let pick = match call.parsed.method {
                    Some(Method::Cot) => Method::Cot,
                    Some(Method::Pal) => Method::Pal,
                    _ => {
                        tracing::warn!(task = task.index, "router gave no usable pick, flipping a coin");
                        coin_flip()
                    }
                };
                outcome.final_answer = Some(if pick == Method::Cot { a } else { b });
                outcome.method_chosen = Some(pick);
                outcome.selection_trace = Some(SelectionTrace::Router {
                    raw: call.raw,
                    decision: call.parsed,
                    prompt: call.prompt,
                });
            }
            (Some(a), _) => {
                outcome.final_answer = Some(a);
                outcome.method_chosen = Some(Method::Cot);
            }
            (None, Some(b)) => {
                outcome.final_answer = Some(b);
                outcome.method_chosen = Some(Method::Pal);
            }
            (None, None) => {}
        }

        Ok(Sample { results, outcome })
    }
}
