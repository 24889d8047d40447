// src/provider/backbone.rs — Backbone model family and its model names

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::infra::config::ModelsConfig;

/// The completion model family a run is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backbone {
    Gpt4,
    Chatgpt,
}

impl Backbone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backbone::Gpt4 => "gpt4",
            Backbone::Chatgpt => "chatgpt",
        }
    }
}

impl std::fmt::Display for Backbone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Backbone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpt4" | "gpt-4" => Ok(Backbone::Gpt4),
            "chatgpt" | "gpt-3.5-turbo" => Ok(Backbone::Chatgpt),
            other => Err(format!("unknown backbone '{other}' (expected gpt4 or chatgpt)")),
        }
    }
}

/// Concrete model names for one backbone.
#[derive(Debug, Clone, PartialEq)]
pub struct BackboneModels {
    pub backbone: Backbone,
    /// Used for every call unless a prompt needs a longer window.
    pub default: String,
    /// Used for the lengthy critique prompt when many few-shots are requested.
    pub long_context: String,
}

impl BackboneModels {
    pub fn from_config(backbone: Backbone, models: &ModelsConfig) -> Self {
        match backbone {
            Backbone::Gpt4 => Self {
                backbone,
                default: models.gpt4.clone(),
                long_context: models.gpt4.clone(),
            },
            Backbone::Chatgpt => Self {
                backbone,
                default: models.chatgpt.clone(),
                long_context: models.chatgpt_long.clone(),
            },
        }
    }

    /// Model for the critique prompt: chatgpt switches to its long-context
    /// variant once five or more few-shots are requested.
    pub fn critique_model(&self, requested_fewshot: usize) -> &str {
        match self.backbone {
            Backbone::Chatgpt if requested_fewshot >= 5 => &self.long_context,
            _ => &self.default,
        }
    }
}
