// src/core/record.rs — Persisted per-task record

use serde::{Deserialize, Serialize};

use super::aggregate::majority_vote;
use super::types::*;
use crate::provider::MessageSequence;

/// A prompt issued while resolving a sample, with what it was for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTrace {
    pub purpose: String,
    pub messages: MessageSequence,
}

/// One sample's resolution plus every strategy prompt it issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleTrace {
    #[serde(flatten)]
    pub outcome: ReconciliationOutcome,
    pub task_prompts: Vec<PromptTrace>,
}

/// One JSONL line: all `sc_num` samples for a task folded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub index: u64,
    pub question: String,
    pub answer: f64,
    pub majority_ans: Option<f64>,
    pub final_answers: Vec<Option<f64>>,
    pub cot_executed: Vec<Option<f64>>,
    pub pal_executed: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub p2c_executed: Vec<Option<f64>>,
    pub cot_generated: Vec<String>,
    pub pal_generated: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub p2c_generated: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plans: Vec<String>,
    /// Raw tie-break or router outputs, in sample order.
    pub choice_solution: Vec<String>,
    pub is_correct: bool,
    pub mode: String,
    pub samples: Vec<SampleTrace>,
}

impl TaskRecord {
    pub fn from_samples(task: &Task, mode: &str, samples: Vec<Sample>) -> Self {
        let mut record = TaskRecord {
            index: task.index,
            question: task.question.clone(),
            answer: task.answer,
            majority_ans: None,
            final_answers: Vec::with_capacity(samples.len()),
            cot_executed: Vec::new(),
            pal_executed: Vec::new(),
            p2c_executed: Vec::new(),
            cot_generated: Vec::new(),
            pal_generated: Vec::new(),
            p2c_generated: Vec::new(),
            plans: Vec::new(),
            choice_solution: Vec::new(),
            is_correct: false,
            mode: mode.to_string(),
            samples: Vec::with_capacity(samples.len()),
        };

        for sample in samples {
            let mut task_prompts = Vec::new();
            for result in sample.results {
                let (executed, generated) = match result.method {
                    Method::Cot => (&mut record.cot_executed, &mut record.cot_generated),
                    Method::Pal => (&mut record.pal_executed, &mut record.pal_generated),
                    Method::P2c => (&mut record.p2c_executed, &mut record.p2c_generated),
                };
                executed.push(result.parsed_answer);
                generated.push(result.raw_text);
                if let Some(plan) = result.plan {
                    record.plans.push(plan.text);
                    task_prompts.push(PromptTrace {
                        purpose: "plan".into(),
                        messages: plan.prompt,
                    });
                }
                task_prompts.push(PromptTrace {
                    purpose: result.method.as_str().into(),
                    messages: result.prompt_used,
                });
            }

            match &sample.outcome.selection_trace {
                Some(SelectionTrace::Choice { raw, .. }) | Some(SelectionTrace::Router { raw, .. }) => {
                    record.choice_solution.push(raw.clone());
                }
                None => {}
            }

            record.final_answers.push(sample.outcome.final_answer);
            record.samples.push(SampleTrace {
                outcome: sample.outcome,
                task_prompts,
            });
        }

        record.majority_ans = majority_vote(&record.final_answers);
        record.is_correct = record.majority_ans == Some(task.answer);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;

    fn task() -> Task {
        Task {
            index: 0,
            question: "Q".into(),
            answer: 42.0,
        }
    }

    fn result(method: Method, answer: Option<f64>) -> StrategyResult {
        StrategyResult {
            method,
            raw_text: format!("{method} text"),
            parsed_answer: answer,
            prompt_used: vec![Message::user("Q")],
            plan: None,
        }
    }

    fn sample(results: Vec<StrategyResult>, final_answer: Option<f64>) -> Sample {
        Sample {
            results,
            outcome: ReconciliationOutcome {
                final_answer,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_record_folds_samples() {
        let samples = vec![
            sample(vec![result(Method::Cot, Some(42.0)), result(Method::Pal, Some(42.0))], Some(42.0)),
            sample(vec![result(Method::Cot, Some(40.0)), result(Method::Pal, None)], Some(40.0)),
            sample(vec![result(Method::Cot, Some(42.0)), result(Method::Pal, Some(42.0))], Some(42.0)),
        ];
        let rec = TaskRecord::from_samples(&task(), "model_selection", samples);
        assert_eq!(rec.final_answers, vec![Some(42.0), Some(40.0), Some(42.0)]);
        assert_eq!(rec.majority_ans, Some(42.0));
        assert!(rec.is_correct);
        assert_eq!(rec.cot_executed.len(), 3);
        assert_eq!(rec.pal_executed[1], None);
        assert!(rec.p2c_executed.is_empty());
        assert_eq!(rec.samples[0].task_prompts.len(), 2);
    }

    #[test]
    fn test_record_incorrect_on_null_majority() {
        let samples = vec![sample(vec![], None)];
        let rec = TaskRecord::from_samples(&task(), "single", samples);
        assert_eq!(rec.majority_ans, None);
        assert!(!rec.is_correct);
    }

    #[test]
    fn test_record_collects_plans_and_selection() {
        let mut p2c = result(Method::P2c, Some(42.0));
        p2c.plan = Some(PlanTrace {
            text: "1. add".into(),
            prompt: vec![Message::system("plan")],
        });
        let mut s = sample(vec![result(Method::Cot, Some(40.0)), p2c], Some(42.0));
        s.outcome.selection_trace = Some(SelectionTrace::Choice {
            raw: "(B)".into(),
            choice: Some(Choice::B),
            prompt: vec![],
        });
        let rec = TaskRecord::from_samples(&task(), "model_selection", vec![s]);
        assert_eq!(rec.plans, vec!["1. add".to_string()]);
        assert_eq!(rec.choice_solution, vec!["(B)".to_string()]);
        assert_eq!(rec.samples[0].task_prompts[1].purpose, "plan");

        let line = serde_json::to_value(&rec).unwrap();
        assert_eq!(line["samples"][0]["selection_trace"]["choice"], "(B)");
        assert_eq!(line["samples"][0]["final_answer"], 42.0);
        assert!(line.get("p2c_generated").is_some());
    }
}
