// src/core/types.rs — Core domain types

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::provider::MessageSequence;

/// Numeric tolerance under which two strategy answers count as the same.
pub const ANSWER_TOLERANCE: f64 = 1e-3;

/// One math word problem from the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub index: u64,
    pub question: String,
    pub answer: f64,
}

/// A reasoning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Free-form chain-of-thought ending in a stated number.
    Cot,
    /// Program-aided: the completion is a program whose result is the answer.
    Pal,
    /// Plan-to-code: a natural-language plan, then a program written against it.
    P2c,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Cot => "cot",
            Method::Pal => "pal",
            Method::P2c => "p2c",
        }
    }

    pub fn all() -> &'static [Method] {
        &[Method::Cot, Method::Pal, Method::P2c]
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cot" => Ok(Method::Cot),
            "pal" => Ok(Method::Pal),
            // `plancode` is the historical ablation name
            "p2c" | "plancode" => Ok(Method::P2c),
            other => Err(format!("unknown method '{other}' (expected cot, pal or p2c)")),
        }
    }
}

/// The plan half of a plan-to-code run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTrace {
    pub text: String,
    pub prompt: MessageSequence,
}

/// Output of one strategy invocation within one sample.
///
/// `parsed_answer` is `None` exactly when extraction or execution failed;
/// it is an abstention, never a zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub method: Method,
    pub raw_text: String,
    pub parsed_answer: Option<f64>,
    pub prompt_used: MessageSequence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanTrace>,
}

impl StrategyResult {
    /// A result that produced nothing usable, e.g. a plan-to-code run whose
    /// plan came back empty.
    pub fn abstain(method: Method, prompt_used: MessageSequence) -> Self {
        Self {
            method,
            raw_text: String::new(),
            parsed_answer: None,
            prompt_used,
            plan: None,
        }
    }
}

/// Selection marker parsed out of a tie-break completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Choice {
    #[serde(rename = "(A)")]
    A,
    #[serde(rename = "(B)")]
    B,
}

/// Output of the router prompt used by actor selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterDecision {
    pub hint: String,
    /// `None` when the router output could not be parsed into a known method.
    pub method: Option<Method>,
}

/// How a disagreement (or a routing decision) was resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionTrace {
    /// Model-selection tie-break between (A) = CoT and (B) = program.
    Choice {
        raw: String,
        choice: Option<Choice>,
        prompt: MessageSequence,
    },
    /// Router call that picked the strategy to run or to trust.
    Router {
        raw: String,
        decision: RouterDecision,
        prompt: MessageSequence,
    },
}

/// Before/after record for the strategy the critique prompt re-attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reattempt {
    pub method: Method,
    pub answer_before: Option<f64>,
    pub answer_after: Option<f64>,
    pub solution_before: Option<String>,
    pub solution_after: Option<String>,
}

/// Critique/repair bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepairInfo {
    /// All non-null answers agreed; no critique call was made.
    Concordant {
        agreed: Vec<Method>,
        disagreed: Vec<Method>,
    },
    /// The critique prompt was issued and its block re-derived.
    Critique {
        raw_output: String,
        prompt: MessageSequence,
        failed_method: Option<Method>,
        good_method: Option<Method>,
        /// What actually produced the answer; CoT when the good method's
        /// own execution failed and numeric extraction was used instead.
        actual_method: Option<Method>,
        hint: Option<String>,
        good_solution: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reattempt: Option<Reattempt>,
    },
}

/// The resolution of one sample's strategy results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub final_answer: Option<f64>,
    pub method_chosen: Option<Method>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_trace: Option<SelectionTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_info: Option<RepairInfo>,
}

/// Everything one reconciliation pass produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub results: Vec<StrategyResult>,
    pub outcome: ReconciliationOutcome,
}

impl Sample {
    pub fn result_for(&self, method: Method) -> Option<&StrategyResult> {
        self.results.iter().find(|r| r.method == method)
    }
}

/// `|a - b|` for two present answers.
pub fn answer_gap(a: f64, b: f64) -> f64 {
    (a - b).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!("cot".parse::<Method>().unwrap(), Method::Cot);
        assert_eq!("PAL".parse::<Method>().unwrap(), Method::Pal);
        assert_eq!("plancode".parse::<Method>().unwrap(), Method::P2c);
        assert_eq!("p2c".parse::<Method>().unwrap(), Method::P2c);
        assert!("tot".parse::<Method>().is_err());
    }

    #[test]
    fn test_method_serde_lowercase() {
        let json = serde_json::to_string(&Method::P2c).unwrap();
        assert_eq!(json, "\"p2c\"");
        let m: Method = serde_json::from_str("\"cot\"").unwrap();
        assert_eq!(m, Method::Cot);
    }

    #[test]
    fn test_task_deserializes_integer_answer() {
        let t: Task =
            serde_json::from_str(r#"{"index": 3, "question": "Q?", "answer": 42}"#).unwrap();
        assert_eq!(t.index, 3);
        assert_eq!(t.answer, 42.0);
    }

    #[test]
    fn test_choice_serializes_with_parens() {
        assert_eq!(serde_json::to_string(&Choice::B).unwrap(), "\"(B)\"");
    }

    #[test]
    fn test_abstain_has_no_answer() {
        let r = StrategyResult::abstain(Method::P2c, vec![]);
        assert!(r.parsed_answer.is_none());
        assert!(r.raw_text.is_empty());
    }

    #[test]
    fn test_repair_info_tagged() {
        let info = RepairInfo::Concordant {
            agreed: vec![Method::Cot, Method::Pal],
            disagreed: vec![],
        };
        let v = serde_json::to_value(&info).unwrap();
        assert_eq!(v["kind"], "concordant");
        assert_eq!(v["agreed"][1], "pal");
    }

    #[test]
    fn test_sample_result_lookup() {
        let sample = Sample {
            results: vec![StrategyResult::abstain(Method::Cot, vec![])],
            outcome: ReconciliationOutcome::default(),
        };
        assert!(sample.result_for(Method::Cot).is_some());
        assert!(sample.result_for(Method::Pal).is_none());
    }
}
