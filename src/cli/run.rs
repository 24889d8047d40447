// src/cli/run.rs — Default command: run a dataset slice end to end

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::aggregate::SelfConsistency;
use crate::core::driver::{RunSummary, TaskDriver};
use crate::core::reconcile::ReconciliationEngine;
use crate::core::retry::RetryPolicy;
use crate::core::strategy::StrategyRunner;
use crate::data::dataset;
use crate::data::log::{self, ResultLog};
use crate::evaluator::PythonSandbox;
use crate::infra::config::Config;
use crate::infra::paths::{self, RunName};
use crate::prompts::PromptLibrary;
use crate::provider::backbone::BackboneModels;
use crate::provider::openai::OpenAIProvider;

/// Wire everything from the config and process the configured slice.
pub async fn run_experiment(config: &Config) -> anyhow::Result<RunSummary> {
    // Flags are checked before any file is touched.
    let mode = config.reconcile.resolve()?;
    let run = &config.run;
    tracing::info!(mode = mode.label(), backbone = %run.backbone, "reconciliation mode resolved");

    let prompts = PromptLibrary::load(&run.prompts_dir, run.backbone)?;

    let provider = OpenAIProvider::new(
        config.provider.api_key()?,
        config.provider.base_url.clone(),
        Duration::from_secs(config.provider.request_timeout_secs),
    )?;
    let sandbox = PythonSandbox::new(
        &config.sandbox.python,
        Duration::from_millis(config.sandbox.timeout_ms),
    )?;
    tracing::debug!(python = %sandbox.interpreter().display(), "sandbox ready");

    let all = dataset::load_jsonl(&dataset::dataset_path(&run.dataset_dir, &run.dataset))?;
    let (tasks, end) = dataset::slice(&all, run.start, run.end);

    let results = paths::results_path(
        &run.output_dir,
        run.backbone,
        &RunName {
            dataset: &run.dataset,
            k_fewshot: run.k_fewshot,
            sc_num: run.sc_num,
            start: run.start,
            end,
        },
        Local::now(),
    );
    let result_log = ResultLog::create(&results)?;
    tracing::info!(
        tasks = tasks.len(),
        start = run.start,
        end,
        output = %results.display(),
        "starting run"
    );

    let runner = StrategyRunner::new(
        Arc::new(provider),
        Arc::new(sandbox),
        Arc::new(prompts),
        BackboneModels::from_config(run.backbone, &config.models),
        config.sampling.clone(),
        run.k_fewshot,
    );
    let engine = ReconciliationEngine::new(runner, mode);
    let driver = TaskDriver::new(
        SelfConsistency::new(engine, run.sc_num),
        RetryPolicy::from_config(&config.retry),
    );

    let run_id = Uuid::new_v4();
    let summary = driver
        .run(tasks, &result_log)
        .instrument(tracing::info_span!("run", id = %run_id))
        .await?;

    if !summary.unfinished.is_empty() {
        log::write_unfinished(&paths::unfinished_path(&results), &summary.unfinished, config)?;
    }

    tracing::info!(
        finished = summary.finished,
        total = summary.total,
        correct = summary.correct,
        unfinished = summary.unfinished.len(),
        accuracy = format!("{:.4}", summary.accuracy()),
        elapsed_secs = summary.elapsed.as_secs(),
        "run complete"
    );
    Ok(summary)
}
