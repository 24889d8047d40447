// src/evaluator/answer.rs — Numeric answer and choice extraction from completions

use regex::Regex;
use std::sync::OnceLock;

use crate::core::types::Choice;

/// Phrases that introduce the final answer, searched case-insensitively.
/// The text after the last one is where the answer lives.
const ANSWER_MARKERS: &[&str] = &["the answer is", "answer:", "####"];

static NUMBER_RE: OnceLock<Regex> = OnceLock::new();

fn number_re() -> &'static Regex {
    NUMBER_RE.get_or_init(|| {
        // Optional sign, thousands separators, optional decimals.
        Regex::new(r"-?\d+(?:,\d{3})*(?:\.\d+)?").expect("number pattern is valid")
    })
}

/// Pull the final numeric answer out of a free-form completion.
///
/// Looks after the last conventional answer marker ("The answer is",
/// "Answer:", "####"); without a marker, or when the marked region holds no
/// number, the last non-empty line is used. The last number in that region
/// wins. Never panics: anything unparseable is `None`.
pub fn extract_numeric_answer(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(region) = marked_region(text) {
        if let Some(n) = last_number(region) {
            return Some(n);
        }
    }

    let last_line = text.lines().rev().find(|l| !l.trim().is_empty())?;
    last_number(last_line)
}

/// Text following the last answer marker, if any marker occurs.
fn marked_region(text: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lowered = text.to_ascii_lowercase();
    ANSWER_MARKERS
        .iter()
        .filter_map(|m| lowered.rfind(m).map(|idx| idx + m.len()))
        .max()
        .map(|start| &text[start..])
}

fn last_number(region: &str) -> Option<f64> {
    let token = number_re().find_iter(region).last()?.as_str();
    parse_number(token)
}

fn parse_number(token: &str) -> Option<f64> {
    let cleaned: String = token.chars().filter(|c| *c != ',').collect();
    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Find the selection marker in a tie-break completion. The earliest of
/// `(A)` / `(B)` wins.
pub fn extract_choice(text: &str) -> Option<Choice> {
    let a = text.find("(A)");
    let b = text.find("(B)");
    match (a, b) {
        (Some(a), Some(b)) => Some(if a <= b { Choice::A } else { Choice::B }),
        (Some(_), None) => Some(Choice::A),
        (None, Some(_)) => Some(Choice::B),
        (None, None) => None,
    }
}
