// tests/common/mod.rs — Scripted completion service and executor shared by integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mathsel::core::reconcile::{ReconciliationEngine, ReconciliationMode};
use mathsel::core::strategy::StrategyRunner;
use mathsel::core::types::Task;
use mathsel::evaluator::CodeExecutor;
use mathsel::infra::config::{ModelsConfig, SamplingConfig};
use mathsel::infra::errors::MathselError;
use mathsel::prompts::template::{ChatTemplate, CodeTemplate, CritiqueTemplate, PlanTemplate, TextTemplate};
use mathsel::prompts::PromptLibrary;
use mathsel::provider::backbone::{Backbone, BackboneModels};
use mathsel::provider::*;

pub const COT_SYSTEM: &str = "cot-system";
pub const PAL_SYSTEM: &str = "pal-system";
pub const SELECT_SYSTEM: &str = "select-system";
pub const PLAN_SYSTEM: &str = "plan-system";
pub const CODE_SYSTEM: &str = "code-system";

/// Which call site issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Cot,
    Pal,
    Select,
    Plan,
    Code,
    Router,
    Critique,
}

fn classify(request: &CompletionRequest) -> Call {
    let system = request
        .messages
        .first()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str());
    match system {
        Some(COT_SYSTEM) => Call::Cot,
        Some(PAL_SYSTEM) => Call::Pal,
        Some(SELECT_SYSTEM) => Call::Select,
        Some(PLAN_SYSTEM) => Call::Plan,
        Some(CODE_SYSTEM) => Call::Code,
        _ if request.stop.as_deref() == Some("Answer: ") => Call::Router,
        _ => Call::Critique,
    }
}

/// Replies per call site. Each call pops the next reply; the last one sticks.
/// The first `failures` calls fail with a retriable provider error.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<HashMap<Call, VecDeque<String>>>,
    failures: AtomicUsize,
    requests: Mutex<Vec<(Call, CompletionRequest)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, call: Call, text: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(call)
            .or_default()
            .push_back(text.to_string());
        self
    }

    pub fn fail_first(self, n: usize) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self, call: Call) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == call)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_for(&self, call: Call) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == call)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, MathselError> {
        let call = classify(&request);
        self.requests.lock().unwrap().push((call, request));

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(MathselError::Provider {
                provider: "scripted".into(),
                message: "HTTP 503".into(),
                retriable: true,
            });
        }

        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(&call).ok_or_else(|| MathselError::Provider {
            provider: "scripted".into(),
            message: format!("no reply scripted for {call:?}"),
            retriable: false,
        })?;
        let content = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(Completion {
            content,
            usage: TokenUsage::default(),
            stop_reason: StopReason::EndTurn,
        })
    }
}

/// Answers with the literal on the last `return` line; anything else is `None`.
#[derive(Default)]
pub struct ReturnExecutor {
    runs: AtomicUsize,
}

impl ReturnExecutor {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeExecutor for ReturnExecutor {
    async fn run(&self, program: &str) -> Option<f64> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        program
            .lines()
            .rev()
            .find_map(|l| l.trim().strip_prefix("return "))
            .and_then(|v| v.trim().parse().ok())
    }
}

fn chat(system: &str, question: &str) -> ChatTemplate {
    ChatTemplate {
        system: system.into(),
        user: String::new(),
        assistant: String::new(),
        question: question.into(),
    }
}

pub fn library() -> PromptLibrary {
    PromptLibrary {
        cot: chat(COT_SYSTEM, "Question: {QUESTION}"),
        pal: chat(PAL_SYSTEM, "Question: {QUESTION}\n\n# solution in Python"),
        select: chat(
            SELECT_SYSTEM,
            "Math problem: {QUESTION}\n\n(A)\n{COT}\n\n(B)\n{PROGRAM}\n\nWhich of the above two choices can correctly answer the math problem?",
        ),
        plan: PlanTemplate {
            system_msg: PLAN_SYSTEM.into(),
            user_template: "{NEWLINE2_FEWSHOTS}\n\nQuestion: {QUESTION}\nPlan:".into(),
            fewshots: vec!["Question: 1 + 1?\nPlan:\n1. Add.\n</end>".into()],
            assistant_start: String::new(),
        },
        code: CodeTemplate {
            system_msg: CODE_SYSTEM.into(),
            user_template: "Question: {QUESTION}".into(),
            assistant_start: "def solution():\n    \"\"\"{PROCESSEDPLAN}\"\"\"".into(),
        },
    }
}

pub fn router_template() -> TextTemplate {
    TextTemplate {
        path: "router.txt".into(),
        raw: "Pick a method.\n\nQuestion: {QUESTION}\nHint:".into(),
    }
}

pub fn critique_template() -> CritiqueTemplate {
    CritiqueTemplate {
        text: TextTemplate {
            path: "critique_cotpal.txt".into(),
            raw: "Find the failed method.\n\n\nQuestion: 1 + 1?\nFailed Method: (CoT)\nSolution: 2\n\n\nQuestion: {QUESTION}".into(),
        },
        fewshot_cap: 2,
    }
}

pub fn runner(provider: Arc<ScriptedProvider>, executor: Arc<ReturnExecutor>) -> StrategyRunner {
    StrategyRunner::new(
        provider,
        executor,
        Arc::new(library()),
        BackboneModels::from_config(Backbone::Chatgpt, &ModelsConfig::default()),
        SamplingConfig::default(),
        2,
    )
}

pub fn engine(
    provider: &Arc<ScriptedProvider>,
    executor: &Arc<ReturnExecutor>,
    mode: ReconciliationMode,
) -> ReconciliationEngine {
    ReconciliationEngine::new(runner(provider.clone(), executor.clone()), mode)
}

pub fn task(answer: f64) -> Task {
    Task {
        index: 0,
        question: "Q".into(),
        answer,
    }
}
