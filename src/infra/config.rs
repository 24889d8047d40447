// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::reconcile::ReconciliationMode;
use crate::core::types::Method;
use crate::infra::errors::MathselError;
use crate::infra::paths;
use crate::prompts::template::{CritiqueTemplate, TextTemplate};
use crate::provider::backbone::Backbone;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Named dataset (`gsm8k`, `svamp`, ...) or a path to a JSONL file.
    pub dataset: String,
    pub dataset_dir: PathBuf,
    pub output_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub start: usize,
    /// Exclusive; `-1` means the end of the dataset.
    pub end: i64,
    pub sc_num: u32,
    pub backbone: Backbone,
    pub k_fewshot: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dataset: "gsm8k".into(),
            dataset_dir: PathBuf::from("dataset"),
            output_dir: PathBuf::from("output"),
            prompts_dir: PathBuf::from("prompts"),
            start: 0,
            end: -1,
            sc_num: 1,
            backbone: Backbone::Gpt4,
            k_fewshot: 8,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub cot_temperature: f32,
    pub pal_temperature: f32,
    pub plan_temperature: f32,
    pub code_temperature: f32,
}

/// Raw reconciliation flags, resolved once into a `ReconciliationMode`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Run only this strategy.
    pub ablation: Option<Method>,
    /// Use plan-to-code instead of PAL as the second opinion.
    pub use_plancode: bool,
    /// Router prompt for actor selection.
    pub actor_selection_prompt: Option<PathBuf>,
    /// Prefix the routed strategy's question with the router's hint.
    pub prog_hint_prompting: bool,
    /// Critique prompt.
    pub cohprompt: Option<PathBuf>,
    /// Only escalate on conflict between 2 (CoT, PAL) or 3 (+ P2C) strategies.
    pub when_only_conflict: Option<u8>,
}

impl ReconcileConfig {
    /// Resolve the flags into exactly one mode, loading the prompt files the
    /// mode needs. Contradictory flags are configuration errors.
    pub fn resolve(&self) -> Result<ReconciliationMode, MathselError> {
        if let Some(n) = self.when_only_conflict {
            let three_way = match n {
                2 => false,
                3 => true,
                other => {
                    return Err(MathselError::Config(format!(
                        "when_only_conflict must be 2 or 3, got {other}"
                    )))
                }
            };
            if self.ablation.is_some() {
                return Err(MathselError::Config(
                    "when_only_conflict cannot be combined with ablation".into(),
                ));
            }
            return match (&self.cohprompt, &self.actor_selection_prompt) {
                (Some(critique), _) => Ok(ReconciliationMode::Critique {
                    prompt: CritiqueTemplate::load(critique)?,
                    three_way,
                }),
                (None, Some(router)) => Ok(ReconciliationMode::ConflictActorSelection {
                    router: TextTemplate::load(router)?,
                    three_way,
                }),
                (None, None) => Err(MathselError::Config(
                    "when_only_conflict needs a critique prompt or an actor selection prompt".into(),
                )),
            };
        }

        if let Some(critique) = &self.cohprompt {
            if self.ablation.is_some() || self.actor_selection_prompt.is_some() {
                return Err(MathselError::Config(
                    "the critique prompt cannot be combined with ablation or actor selection".into(),
                ));
            }
            return Ok(ReconciliationMode::DirectCritique {
                prompt: CritiqueTemplate::load(critique)?,
            });
        }

        if let Some(router) = &self.actor_selection_prompt {
            if self.ablation.is_some() {
                return Err(MathselError::Config(
                    "actor selection cannot be combined with ablation".into(),
                ));
            }
            return Ok(ReconciliationMode::ActorSelection {
                router: TextTemplate::load(router)?,
                inject_hint: self.prog_hint_prompting,
            });
        }

        if let Some(method) = self.ablation {
            return Ok(ReconciliationMode::Single { method });
        }

        Ok(ReconciliationMode::ModelSelection {
            second: if self.use_plancode {
                Method::P2c
            } else {
                Method::Pal
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Fallback key file, read when the variable is unset.
    pub api_key_file: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: crate::provider::openai::DEFAULT_BASE_URL.into(),
            api_key_env: "OPENAI_API_KEY".into(),
            api_key_file: None,
            request_timeout_secs: 120,
        }
    }
}

impl ProviderConfig {
    pub fn api_key(&self) -> Result<String, MathselError> {
        if let Ok(key) = std::env::var(&self.api_key_env) {
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
        }
        if let Some(path) = &self.api_key_file {
            let key = std::fs::read_to_string(path).map_err(|e| {
                MathselError::Config(format!("cannot read API key file {}: {e}", path.display()))
            })?;
            let key = key.trim();
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }
        Err(MathselError::Config(format!(
            "no API key: set {} or provider.api_key_file",
            self.api_key_env
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub gpt4: String,
    pub chatgpt: String,
    /// Long-context chatgpt model for many-shot critique prompts.
    pub chatgpt_long: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            gpt4: "gpt-4".into(),
            chatgpt: "gpt-3.5-turbo".into(),
            chatgpt_long: "gpt-3.5-turbo-16k".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub python: String,
    pub timeout_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: "python3".into(),
            timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_backoff_ms: 1000,
            max_backoff_ms: 3000,
        }
    }
}

impl Config {
    /// Load from `mathsel.toml` (or `$MATHSEL_CONFIG`), falling back to
    /// defaults when the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.run.dataset, "gsm8k");
        assert_eq!(c.run.end, -1);
        assert_eq!(c.run.sc_num, 1);
        assert_eq!(c.run.k_fewshot, 8);
        assert_eq!(c.run.backbone, Backbone::Gpt4);
        assert_eq!(c.retry.max_attempts, 3);
        assert_eq!(c.sandbox.timeout_ms, 2000);
        assert_eq!(c.provider.api_key_env, "OPENAI_API_KEY");
        assert_eq!(c.sampling.cot_temperature, 0.0);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c.run.dataset, "gsm8k");
        assert!(c.reconcile.ablation.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[run]
dataset = "svamp"
start = 10
end = 20
sc_num = 5
backbone = "chatgpt"
k_fewshot = 4

[sampling]
cot_temperature = 0.5
pal_temperature = 0.5

[reconcile]
ablation = "pal"

[models]
chatgpt = "gpt-3.5-turbo-0613"

[sandbox]
timeout_ms = 500

[retry]
max_attempts = 5
"#;
        let c: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(c.run.dataset, "svamp");
        assert_eq!(c.run.start, 10);
        assert_eq!(c.run.end, 20);
        assert_eq!(c.run.sc_num, 5);
        assert_eq!(c.run.backbone, Backbone::Chatgpt);
        assert_eq!(c.run.output_dir, PathBuf::from("output"));
        assert_eq!(c.sampling.pal_temperature, 0.5);
        assert_eq!(c.sampling.plan_temperature, 0.0);
        assert_eq!(c.reconcile.ablation, Some(Method::Pal));
        assert_eq!(c.models.chatgpt, "gpt-3.5-turbo-0613");
        assert_eq!(c.models.chatgpt_long, "gpt-3.5-turbo-16k");
        assert_eq!(c.sandbox.timeout_ms, 500);
        assert_eq!(c.sandbox.python, "python3");
        assert_eq!(c.retry.max_attempts, 5);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut c = Config::default();
        c.reconcile.when_only_conflict = Some(3);
        let s = toml::to_string(&c).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.reconcile.when_only_conflict, Some(3));
        assert_eq!(back.run.k_fewshot, 8);
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(Config::load_from(Path::new("/nonexistent/mathsel.toml")).is_err());
    }

    #[test]
    fn test_resolve_default_is_model_selection() {
        let mode = ReconcileConfig::default().resolve().unwrap();
        assert!(matches!(
            mode,
            ReconciliationMode::ModelSelection { second: Method::Pal }
        ));

        let cfg = ReconcileConfig {
            use_plancode: true,
            ..Default::default()
        };
        assert!(matches!(
            cfg.resolve().unwrap(),
            ReconciliationMode::ModelSelection { second: Method::P2c }
        ));
    }

    #[test]
    fn test_resolve_ablation() {
        let cfg = ReconcileConfig {
            ablation: Some(Method::Cot),
            ..Default::default()
        };
        assert!(matches!(
            cfg.resolve().unwrap(),
            ReconciliationMode::Single { method: Method::Cot }
        ));
    }

    #[test]
    fn test_resolve_prompt_modes() {
        let dir = tempfile::tempdir().unwrap();
        let router = write(dir.path(), "router.txt", "Question: {QUESTION}");
        let critique = write(dir.path(), "critique_cotpal.txt", "h\n\n\nex\n\n\nQuestion: {QUESTION}");

        let cfg = ReconcileConfig {
            actor_selection_prompt: Some(router.clone()),
            prog_hint_prompting: true,
            ..Default::default()
        };
        assert!(matches!(
            cfg.resolve().unwrap(),
            ReconciliationMode::ActorSelection { inject_hint: true, .. }
        ));

        let cfg = ReconcileConfig {
            cohprompt: Some(critique.clone()),
            ..Default::default()
        };
        assert!(matches!(
            cfg.resolve().unwrap(),
            ReconciliationMode::DirectCritique { .. }
        ));

        let cfg = ReconcileConfig {
            cohprompt: Some(critique),
            when_only_conflict: Some(3),
            ..Default::default()
        };
        match cfg.resolve().unwrap() {
            ReconciliationMode::Critique { prompt, three_way } => {
                assert!(three_way);
                assert_eq!(prompt.fewshot_cap, 2);
            }
            other => panic!("unexpected mode {}", other.label()),
        }

        let cfg = ReconcileConfig {
            actor_selection_prompt: Some(router),
            when_only_conflict: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            cfg.resolve().unwrap(),
            ReconciliationMode::ConflictActorSelection { three_way: false, .. }
        ));
    }

    #[test]
    fn test_resolve_rejects_contradictions() {
        let cfg = ReconcileConfig {
            when_only_conflict: Some(2),
            ..Default::default()
        };
        assert!(cfg.resolve().unwrap_err().is_fatal());

        let cfg = ReconcileConfig {
            when_only_conflict: Some(4),
            cohprompt: Some(PathBuf::from("c.txt")),
            ..Default::default()
        };
        assert!(cfg.resolve().unwrap_err().is_fatal());

        let cfg = ReconcileConfig {
            ablation: Some(Method::Pal),
            actor_selection_prompt: Some(PathBuf::from("r.txt")),
            ..Default::default()
        };
        assert!(cfg.resolve().unwrap_err().is_fatal());
    }

    #[test]
    fn test_resolve_missing_prompt_file() {
        let cfg = ReconcileConfig {
            cohprompt: Some(PathBuf::from("/nonexistent/critique.txt")),
            ..Default::default()
        };
        assert!(matches!(cfg.resolve(), Err(MathselError::Config(_))));
    }

    #[test]
    fn test_api_key_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let key = write(dir.path(), "key.txt", "  sk-file \n");
        let cfg = ProviderConfig {
            api_key_env: "MATHSEL_TEST_UNSET_KEY_VAR".into(),
            api_key_file: Some(key),
            ..Default::default()
        };
        assert_eq!(cfg.api_key().unwrap(), "sk-file");
    }

    #[test]
    fn test_api_key_missing_is_config_error() {
        let cfg = ProviderConfig {
            api_key_env: "MATHSEL_TEST_UNSET_KEY_VAR".into(),
            ..Default::default()
        };
        assert!(cfg.api_key().unwrap_err().is_fatal());
    }
}
