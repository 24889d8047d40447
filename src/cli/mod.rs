// src/cli/mod.rs — CLI definition (clap derive)

pub mod run;

use clap::Parser;
use std::path::PathBuf;

use crate::core::types::Method;
use crate::infra::config::Config;
use crate::provider::backbone::Backbone;

/// Every flag overrides the matching field of the config file.
#[derive(Parser, Debug, Default)]
#[command(
    name = "mathsel",
    about = "Run CoT, PAL and plan-to-code on a math dataset and reconcile their answers",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// First task (inclusive)
    #[arg(long)]
    pub start: Option<usize>,

    /// Last task (exclusive, -1 = end of dataset)
    #[arg(long, allow_negative_numbers = true)]
    pub end: Option<i64>,

    /// Named dataset (gsm8k, svamp, asdiv, ...) or path to a JSONL file
    #[arg(long)]
    pub dataset: Option<String>,

    /// gpt4 or chatgpt
    #[arg(long)]
    pub backbone: Option<Backbone>,

    #[arg(long)]
    pub cot_temperature: Option<f32>,

    #[arg(long)]
    pub pal_temperature: Option<f32>,

    #[arg(long)]
    pub plan_temperature: Option<f32>,

    #[arg(long)]
    pub code_temperature: Option<f32>,

    /// Samples per task for the self-consistency vote
    #[arg(long)]
    pub sc_num: Option<u32>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Use plan-to-code as the second opinion in model selection
    #[arg(long)]
    pub use_plancode: bool,

    /// Few-shot examples for plan and critique prompts
    #[arg(long)]
    pub k_fewshot: Option<usize>,

    /// Run a single strategy: cot, pal or p2c
    #[arg(long)]
    pub ablation: Option<Method>,

    /// Router prompt file; enables actor selection
    #[arg(long)]
    pub actor_selection_prompt: Option<PathBuf>,

    /// Pass the router's hint to the chosen strategy
    #[arg(long)]
    pub prog_hint_prompting: bool,

    /// Critique prompt file; enables critique repair
    #[arg(long)]
    pub cohprompt: Option<PathBuf>,

    /// Only escalate when 2 (CoT, PAL) or 3 (+ plan-to-code) strategies disagree
    #[arg(long)]
    pub when_only_conflict: Option<u8>,
}

impl Cli {
    /// Layer the flags over a loaded config.
    pub fn apply(&self, config: &mut Config) {
        let run = &mut config.run;
        if let Some(start) = self.start {
            run.start = start;
        }
        if let Some(end) = self.end {
            run.end = end;
        }
        if let Some(ref dataset) = self.dataset {
            run.dataset = dataset.clone();
        }
        if let Some(backbone) = self.backbone {
            run.backbone = backbone;
        }
        if let Some(sc) = self.sc_num {
            run.sc_num = sc;
        }
        if let Some(ref dir) = self.output_dir {
            run.output_dir = dir.clone();
        }
        if let Some(k) = self.k_fewshot {
            run.k_fewshot = k;
        }

        let sampling = &mut config.sampling;
        if let Some(t) = self.cot_temperature {
            sampling.cot_temperature = t;
        }
        if let Some(t) = self.pal_temperature {
            sampling.pal_temperature = t;
        }
        if let Some(t) = self.plan_temperature {
            sampling.plan_temperature = t;
        }
        if let Some(t) = self.code_temperature {
            sampling.code_temperature = t;
        }

        let reconcile = &mut config.reconcile;
        reconcile.use_plancode |= self.use_plancode;
        reconcile.prog_hint_prompting |= self.prog_hint_prompting;
        if self.ablation.is_some() {
            reconcile.ablation = self.ablation;
        }
        if let Some(ref p) = self.actor_selection_prompt {
            reconcile.actor_selection_prompt = Some(p.clone());
        }
        if let Some(ref p) = self.cohprompt {
            reconcile.cohprompt = Some(p.clone());
        }
        if self.when_only_conflict.is_some() {
            reconcile.when_only_conflict = self.when_only_conflict;
        }
    }
}
