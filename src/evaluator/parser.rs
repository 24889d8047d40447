// src/evaluator/parser.rs — Parse router and critique completions into structured decisions

use crate::core::types::{Method, RouterDecision};

const ROUTER_SPLIT: &str = "Promising Method: ";

/// Parse the router completion: `<hint> Promising Method: <method>`.
///
/// The tail is matched by short tag first (`p2c`, `cot`, `pal`), then by the
/// long strategy names. Anything unrecognised keeps the whole output as the
/// hint and leaves `method` empty.
pub fn parse_router_output(raw: &str) -> RouterDecision {
    let failed = || RouterDecision {
        hint: raw.trim().to_string(),
        method: None,
    };

    let Some((hint, tail)) = raw.split_once(ROUTER_SPLIT) else {
        tracing::warn!("router output has no method line");
        return failed();
    };

    let tail = tail.trim().to_ascii_lowercase();
    let method = if tail.contains("p2c") {
        Some(Method::P2c)
    } else if tail.contains("cot") {
        Some(Method::Cot)
    } else if tail.contains("pal") {
        Some(Method::Pal)
    } else {
        let spaced = tail.replace(['-', '_'], " ");
        if spaced.contains("chain of thought") {
            Some(Method::Cot)
        } else if spaced.contains("program aided language") {
            Some(Method::Pal)
        } else if spaced.contains("plan to code") {
            Some(Method::P2c)
        } else {
            None
        }
    };

    match method {
        Some(method) => RouterDecision {
            hint: hint.trim().to_string(),
            method: Some(method),
        },
        None => {
            tracing::warn!(tail = %tail, "router named an unknown method");
            failed()
        }
    }
}

/// Map a method name as written in a critique block to a `Method`.
/// Hyphens and underscores in the long names read as spaces.
pub fn parse_method_name(text: &str) -> Option<Method> {
    let lowered = text.to_ascii_lowercase().replace(['-', '_'], " ");
    if lowered.contains("(pal)") || lowered.contains("program aided language model") {
        Some(Method::Pal)
    } else if lowered.contains("(cot)") || lowered.contains("chain of thought") {
        Some(Method::Cot)
    } else if lowered.contains("(p2c)") || lowered.contains("plan to code") {
        Some(Method::P2c)
    } else {
        None
    }
}

/// The labelled sections of a critique completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CritiqueBlock {
    pub failed_method: Option<String>,
    pub hint: Option<String>,
    pub successful_method: Option<String>,
    pub solution: Option<String>,
    pub answer: Option<String>,
}

const CRITIQUE_MARKERS: [&str; 5] = [
    "Failed Method:",
    "Hint:",
    "Successful Method:",
    "Solution:",
    "Answer:",
];

/// Byte offset of the first line that starts with `marker`.
fn marker_line(raw: &str, marker: &str) -> Option<usize> {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        if line.trim_start().starts_with(marker) {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Slice a critique completion at its labelled marker lines.
///
/// Each marker's first line opens a section that runs to the next marker
/// line in order of appearance. Returns `None` when the `Solution:` section
/// is missing, since nothing can be re-derived without it.
pub fn parse_critique_block(raw: &str) -> Option<CritiqueBlock> {
    let mut found: Vec<(usize, usize)> = CRITIQUE_MARKERS
        .iter()
        .enumerate()
        .filter_map(|(slot, marker)| marker_line(raw, marker).map(|pos| (pos, slot)))
        .collect();
    found.sort_unstable();

    let mut sections: [Option<String>; 5] = Default::default();
    for (i, &(pos, slot)) in found.iter().enumerate() {
        let start = pos + CRITIQUE_MARKERS[slot].len();
        let end = found.get(i + 1).map(|(next, _)| *next).unwrap_or(raw.len());
        let body = raw.get(start..end).unwrap_or("").trim();
        sections[slot] = Some(body.to_string());
    }

    if sections[3].is_none() {
        tracing::warn!(raw = %raw, "critique output has no Solution section");
        return None;
    }

    let [failed_method, hint, successful_method, solution, answer] = sections;
    Some(CritiqueBlock {
        failed_method,
        hint,
        successful_method,
        solution,
        answer,
    })
}
