// src/core/strategy.rs — Strategy runners and the auxiliary prompt calls

use std::sync::Arc;

use super::types::*;
use crate::evaluator::code::{extract_program, postprocess_plan, split_plan_code, strip_code_fence};
use crate::evaluator::parser::{parse_critique_block, parse_router_output, CritiqueBlock};
use crate::evaluator::{execute_and_get_answer, extract_choice, extract_numeric_answer, CodeExecutor};
use crate::infra::config::SamplingConfig;
use crate::infra::errors::MathselError;
use crate::prompts::builder;
use crate::prompts::template::{CritiqueTemplate, TextTemplate};
use crate::prompts::PromptLibrary;
use crate::provider::backbone::{Backbone, BackboneModels};
use crate::provider::{CompletionRequest, MessageSequence, ModelProvider};

/// Completion shape of one call site.
#[derive(Debug, Clone, Copy)]
struct CallShape {
    max_tokens: u32,
    stop: &'static str,
}

const COT_CALL: CallShape = CallShape { max_tokens: 500, stop: "\n\n\n" };
const PAL_CALL: CallShape = CallShape { max_tokens: 500, stop: "\n\n\n" };
const SELECTION_CALL: CallShape = CallShape { max_tokens: 200, stop: "\n\n" };
const PLAN_CALL: CallShape = CallShape { max_tokens: 1024, stop: "Question: " };
const CODE_CALL: CallShape = CallShape { max_tokens: 1024, stop: "Question: " };
const ROUTER_CALL: CallShape = CallShape { max_tokens: 60, stop: "Answer: " };
const CRITIQUE_CALL: CallShape = CallShape { max_tokens: 500, stop: "\nEvaluation: " };

/// Few-shot count plan-to-code uses on gpt4 regardless of the configured one.
const GPT4_PLAN_FEWSHOT: usize = 5;

/// Raw output of an auxiliary (non-strategy) prompt.
#[derive(Debug, Clone)]
pub struct AuxCall<T> {
    pub raw: String,
    pub parsed: T,
    pub prompt: MessageSequence,
}

/// Runs the three strategies and the selection, router and critique calls.
/// Completion failures propagate; extraction and execution failures become
/// `None` answers.
pub struct StrategyRunner {
    provider: Arc<dyn ModelProvider>,
    executor: Arc<dyn CodeExecutor>,
    prompts: Arc<PromptLibrary>,
    models: BackboneModels,
    sampling: SamplingConfig,
    k_fewshot: usize,
}

impl StrategyRunner {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        executor: Arc<dyn CodeExecutor>,
        prompts: Arc<PromptLibrary>,
        models: BackboneModels,
        sampling: SamplingConfig,
        k_fewshot: usize,
    ) -> Self {
        Self {
            provider,
            executor,
            prompts,
            models,
            sampling,
            k_fewshot,
        }
    }

    async fn complete(
        &self,
        model: &str,
        messages: &MessageSequence,
        shape: CallShape,
        temperature: f32,
    ) -> Result<String, MathselError> {
        let request = CompletionRequest::new(model, messages.clone(), shape.max_tokens)
            .with_stop(shape.stop)
            .with_temperature(temperature);
        let completion = self.provider.complete(request).await?;
        tracing::debug!(
            provider = self.provider.id(),
            model,
            tokens = completion.usage.total(),
            stop = ?completion.stop_reason,
            "completion received"
        );
        Ok(completion.content)
    }

    pub async fn run(
        &self,
        method: Method,
        task: &Task,
        hint: Option<&str>,
    ) -> Result<StrategyResult, MathselError> {
        match method {
            Method::Cot => self.run_cot(task, hint).await,
            Method::Pal => self.run_pal(task, hint).await,
            Method::P2c => self.run_plan_code(task, hint).await,
        }
    }

    pub async fn run_cot(&self, task: &Task, hint: Option<&str>) -> Result<StrategyResult, MathselError> {
        let prompt = builder::cot_prompt(&self.prompts.cot, &task.question, hint);
        let raw = self
            .complete(&self.models.default, &prompt, COT_CALL, self.sampling.cot_temperature)
            .await?;
        let parsed_answer = extract_numeric_answer(&raw);
        if parsed_answer.is_none() {
            tracing::debug!(task = task.index, "no numeric answer in chain-of-thought output");
        }
        Ok(StrategyResult {
            method: Method::Cot,
            raw_text: raw,
            parsed_answer,
            prompt_used: prompt,
            plan: None,
        })
    }

    pub async fn run_pal(&self, task: &Task, hint: Option<&str>) -> Result<StrategyResult, MathselError> {
        let prompt = builder::pal_prompt(&self.prompts.pal, &task.question, hint);
        let raw = self
            .complete(&self.models.default, &prompt, PAL_CALL, self.sampling.pal_temperature)
            .await?;
        let parsed_answer = execute_and_get_answer(self.executor.as_ref(), strip_code_fence(&raw)).await;
        Ok(StrategyResult {
            method: Method::Pal,
            raw_text: raw,
            parsed_answer,
            prompt_used: prompt,
            plan: None,
        })
    }

    /// Plan, then code against the plan. An empty plan ends the run before
    /// any code is requested.
    pub async fn run_plan_code(
        &self,
        task: &Task,
        hint: Option<&str>,
    ) -> Result<StrategyResult, MathselError> {
        let k = match self.models.backbone {
            Backbone::Gpt4 if self.k_fewshot != GPT4_PLAN_FEWSHOT => {
                tracing::debug!(
                    requested = self.k_fewshot,
                    used = GPT4_PLAN_FEWSHOT,
                    "gpt4 plans with a fixed few-shot count"
                );
                GPT4_PLAN_FEWSHOT
            }
            _ => self.k_fewshot,
        };

        let plan_prompt = builder::plan_prompt(&self.prompts.plan, &task.question, hint, k);
        let raw_plan = self
            .complete(&self.models.default, &plan_prompt, PLAN_CALL, self.sampling.plan_temperature)
            .await?;
        let Some(plan) = postprocess_plan(&raw_plan) else {
            tracing::warn!(task = task.index, "empty plan, skipping code generation");
            return Ok(StrategyResult::abstain(Method::P2c, plan_prompt));
        };

        let (code_prompt, preamble) =
            builder::code_prompt(&self.prompts.code, &task.question, hint, &plan);
        let raw_code = self
            .complete(&self.models.default, &code_prompt, CODE_CALL, self.sampling.code_temperature)
            .await?;
        let program = extract_program(&raw_code, &preamble);
        let parsed_answer = execute_and_get_answer(self.executor.as_ref(), &program).await;

        Ok(StrategyResult {
            method: Method::P2c,
            raw_text: program,
            parsed_answer,
            prompt_used: code_prompt,
            plan: Some(PlanTrace {
                text: plan,
                prompt: plan_prompt,
            }),
        })
    }

    /// Ask the model to pick between the CoT solution (A) and the program (B).
    pub async fn select(
        &self,
        task: &Task,
        cot: &StrategyResult,
        program: &StrategyResult,
    ) -> Result<AuxCall<Option<Choice>>, MathselError> {
        let prompt = builder::selection_prompt(
            &self.prompts.select,
            &task.question,
            &cot.raw_text,
            strip_code_fence(&program.raw_text),
        );
        let raw = self.complete(&self.models.default, &prompt, SELECTION_CALL, 0.0).await?;
        let parsed = extract_choice(&raw);
        if parsed.is_none() {
            tracing::warn!(task = task.index, "selection output names neither (A) nor (B)");
        }
        Ok(AuxCall { raw, parsed, prompt })
    }

    /// Ask the router which strategy to trust, with a hint.
    pub async fn route(
        &self,
        router: &TextTemplate,
        task: &Task,
    ) -> Result<AuxCall<RouterDecision>, MathselError> {
        let prompt = builder::router_prompt(router, &task.question);
        let raw = self.complete(&self.models.default, &prompt, ROUTER_CALL, 0.0).await?;
        let parsed = parse_router_output(&raw);
        Ok(AuxCall { raw, parsed, prompt })
    }

    /// Issue the critique prompt and slice its labelled block. `parsed` is
    /// `None` when the block has no solution.
    pub async fn critique(
        &self,
        template: &CritiqueTemplate,
        task: &Task,
    ) -> Result<AuxCall<Option<CritiqueBlock>>, MathselError> {
        let prompt = builder::critique_prompt(template, &task.question, self.k_fewshot);
        let model = self.models.critique_model(self.k_fewshot);
        let raw = self.complete(model, &prompt, CRITIQUE_CALL, 0.0).await?;
        let parsed = parse_critique_block(&raw);
        Ok(AuxCall { raw, parsed, prompt })
    }

    /// Evaluate a solution text written in `method`'s shape: extraction for
    /// CoT, execution for programs. `None` when nothing usable comes out.
    pub async fn evaluate_solution(&self, method: Method, solution: &str) -> Option<f64> {
        match method {
            Method::Cot => extract_numeric_answer(solution),
            Method::Pal => execute_and_get_answer(self.executor.as_ref(), strip_code_fence(solution)).await,
            Method::P2c => {
                let (_, code) = split_plan_code(strip_code_fence(solution))?;
                execute_and_get_answer(self.executor.as_ref(), &code).await
            }
        }
    }
}
