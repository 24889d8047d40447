// src/prompts/mod.rs — Prompt templates and message builders

pub mod builder;
pub mod template;

use std::path::Path;

use crate::infra::errors::MathselError;
use crate::provider::backbone::Backbone;
use template::{ChatTemplate, CodeTemplate, PlanTemplate};

pub const COT_FILE: &str = "cot.yaml";
pub const PAL_FILE: &str = "pal.yaml";
pub const SELECT_FILE: &str = "select.yaml";
pub const PLAN_FILE: &str = "plan.yaml";
pub const CODE_FILE: &str = "code.yaml";

/// The fixed strategy templates for one backbone, loaded once per run.
/// Router and critique prompts are per-mode and live on the reconciliation
/// mode instead.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    pub cot: ChatTemplate,
    pub pal: ChatTemplate,
    pub select: ChatTemplate,
    pub plan: PlanTemplate,
    pub code: CodeTemplate,
}

impl PromptLibrary {
    pub fn load(dir: &Path, backbone: Backbone) -> Result<Self, MathselError> {
        let lib = Self {
            cot: ChatTemplate::load(&dir.join(COT_FILE), backbone)?,
            pal: ChatTemplate::load(&dir.join(PAL_FILE), backbone)?,
            select: ChatTemplate::load(&dir.join(SELECT_FILE), backbone)?,
            plan: PlanTemplate::load(&dir.join(PLAN_FILE))?,
            code: CodeTemplate::load(&dir.join(CODE_FILE))?,
        };
        tracing::debug!(
            dir = %dir.display(),
            backbone = %backbone,
            plan_fewshots = lib.plan.fewshots.len(),
            "prompt library loaded"
        );
        Ok(lib)
    }
}
