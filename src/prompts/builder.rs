// src/prompts/builder.rs — Per-strategy message sequences

use super::template::{render, ChatTemplate, CodeTemplate, CritiqueTemplate, PlanTemplate, TextTemplate};
use crate::evaluator::code::{indent_plan, strip_docstring};
use crate::provider::{Message, MessageSequence};

/// The question as the model sees it, with an optional hint in parentheses.
pub fn question_with_hint(question: &str, hint: Option<&str>) -> String {
    match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => format!("{question} ({hint})"),
        None => question.to_string(),
    }
}

/// System turn, example turns, then the rendered question turn.
fn chat_messages(template: &ChatTemplate, final_user: String) -> MessageSequence {
    let mut messages = vec![Message::system(template.system.clone())];
    for (user, assistant) in template.fewshot_pairs() {
        messages.push(Message::user(user));
        messages.push(Message::assistant(assistant));
    }
    messages.push(Message::user(final_user));
    messages
}

pub fn cot_prompt(template: &ChatTemplate, question: &str, hint: Option<&str>) -> MessageSequence {
    let q = question_with_hint(question, hint);
    chat_messages(template, render(&template.question, &[("QUESTION", &q)]))
}

pub fn pal_prompt(template: &ChatTemplate, question: &str, hint: Option<&str>) -> MessageSequence {
    let q = question_with_hint(question, hint);
    chat_messages(template, render(&template.question, &[("QUESTION", &q)]))
}

/// Tie-break prompt: (A) is the chain-of-thought text, (B) the program with
/// its docstring removed.
pub fn selection_prompt(
    template: &ChatTemplate,
    question: &str,
    cot_text: &str,
    program: &str,
) -> MessageSequence {
    let cot = if cot_text.starts_with("Answer:") {
        cot_text.to_string()
    } else {
        format!("Answer:\n{cot_text}")
    };
    let program = strip_docstring(program);
    let body = render(
        &template.question,
        &[
            ("QUESTION", question.trim()),
            ("COT", cot.trim()),
            ("PROGRAM", program.trim()),
        ],
    );
    chat_messages(template, body)
}

/// Plan request with the first `k_fewshot` examples.
pub fn plan_prompt(
    template: &PlanTemplate,
    question: &str,
    hint: Option<&str>,
    k_fewshot: usize,
) -> MessageSequence {
    let q = question_with_hint(question, hint);
    let k = k_fewshot.min(template.fewshots.len());
    let fewshots = template.fewshots[..k].join("\n\n");
    let user = render(
        &template.user_template,
        &[("NEWLINE2_FEWSHOTS", &fewshots), ("QUESTION", &q)],
    );
    vec![
        Message::system(template.system_msg.clone()),
        Message::user(user),
        Message::assistant(template.assistant_start.clone()),
    ]
}

/// Code request seeded with the plan, plus the `def solution():` preamble
/// (header and plan docstring) a continuation-style answer builds on.
pub fn code_prompt(
    template: &CodeTemplate,
    question: &str,
    hint: Option<&str>,
    plan: &str,
) -> (MessageSequence, String) {
    let q = question_with_hint(question, hint);
    let processed = indent_plan(plan);
    let messages = vec![
        Message::system(template.system_msg.clone()),
        Message::user(render(&template.user_template, &[("QUESTION", &q)])),
        Message::assistant(render(
            &template.assistant_start,
            &[("PROCESSEDPLAN", &processed)],
        )),
    ];
    let preamble = format!("def solution():\n    \"\"\"{processed}\"\"\"");
    (messages, preamble)
}

pub fn router_prompt(template: &TextTemplate, question: &str) -> MessageSequence {
    vec![Message::user(template.render(question))]
}

/// Critique prompt with a clamped, possibly subsampled, example set.
pub fn critique_prompt(template: &CritiqueTemplate, question: &str, k_fewshot: usize) -> MessageSequence {
    let mut rng = rand::thread_rng();
    vec![Message::user(template.render(question, k_fewshot, &mut rng))]
}
