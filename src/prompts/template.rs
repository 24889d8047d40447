// src/prompts/template.rs — Prompt template files (YAML and plain text)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;

use crate::infra::errors::MathselError;
use crate::provider::backbone::Backbone;

/// Separates few-shot turns inside a chat template's `user` / `assistant` text.
pub const CHAT_FEWSHOT_SEPARATOR: &str = "\n\n\n\n";

/// Separates the header, examples and query of a critique prompt file.
pub const CRITIQUE_CHUNK_SEPARATOR: &str = "\n\n\n";

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

/// Substitute `{NAME}` placeholders in one pass. Unknown names are left
/// alone, and substituted text is never rescanned.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let re = PLACEHOLDER_RE
        .get_or_init(|| Regex::new(r"\{([A-Z][A-Z0-9_]*)\}").expect("placeholder pattern is valid"));
    re.replace_all(template, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        vars.iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| (*v).to_string())
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

fn read_file(path: &Path) -> Result<String, MathselError> {
    std::fs::read_to_string(path).map_err(|e| {
        MathselError::Config(format!("cannot read prompt file {}: {e}", path.display()))
    })
}

fn parse_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, MathselError> {
    let content = read_file(path)?;
    serde_yml::from_str(&content).map_err(|e| {
        MathselError::Config(format!("malformed prompt file {}: {e}", path.display()))
    })
}

/// A few-shot chat template: `user` and `assistant` hold the example turns,
/// `question` renders the final user turn.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTemplate {
    pub system: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub assistant: String,
    pub question: String,
}

#[derive(Debug, Deserialize)]
struct ChatTemplateFile {
    gpt4: ChatTemplate,
    chatgpt: ChatTemplate,
}

impl ChatTemplate {
    /// Load the entry for `backbone` from a per-backbone YAML file.
    pub fn load(path: &Path, backbone: Backbone) -> Result<Self, MathselError> {
        let file: ChatTemplateFile = parse_yaml(path)?;
        Ok(match backbone {
            Backbone::Gpt4 => file.gpt4,
            Backbone::Chatgpt => file.chatgpt,
        })
    }

    /// Example turns paired in order as `(user, assistant)`.
    pub fn fewshot_pairs(&self) -> Vec<(&str, &str)> {
        if self.user.trim().is_empty() {
            return Vec::new();
        }
        let users: Vec<&str> = self.user.split(CHAT_FEWSHOT_SEPARATOR).collect();
        let assistants: Vec<&str> = self.assistant.split(CHAT_FEWSHOT_SEPARATOR).collect();
        if users.len() != assistants.len() {
            tracing::warn!(
                users = users.len(),
                assistants = assistants.len(),
                "few-shot turn counts differ; extra turns dropped"
            );
        }
        users.into_iter().zip(assistants).collect()
    }
}

/// Plan-generation template.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanTemplate {
    pub system_msg: String,
    /// Holds `{NEWLINE2_FEWSHOTS}` and `{QUESTION}`.
    pub user_template: String,
    #[serde(default)]
    pub fewshots: Vec<String>,
    #[serde(default)]
    pub assistant_start: String,
}

impl PlanTemplate {
    pub fn load(path: &Path) -> Result<Self, MathselError> {
        parse_yaml(path)
    }
}

/// Plan-to-code template.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeTemplate {
    pub system_msg: String,
    /// Holds `{QUESTION}`.
    pub user_template: String,
    /// Holds `{PROCESSEDPLAN}`, the indented plan.
    pub assistant_start: String,
}

impl CodeTemplate {
    pub fn load(path: &Path) -> Result<Self, MathselError> {
        parse_yaml(path)
    }
}

/// A plain-text prompt with a `{QUESTION}` placeholder, sent as one user turn.
#[derive(Debug, Clone)]
pub struct TextTemplate {
    pub path: PathBuf,
    pub raw: String,
}

impl TextTemplate {
    pub fn load(path: &Path) -> Result<Self, MathselError> {
        Ok(Self {
            path: path.to_path_buf(),
            raw: read_file(path)?.trim().to_string(),
        })
    }

    pub fn render(&self, question: &str) -> String {
        render(&self.raw, &[("QUESTION", question)])
    }
}

/// The critique prompt: a header, examples, and the query, separated by
/// blank-line pairs. Files named for the two-strategy variant (`cotpal`)
/// carry at most two examples; the others six.
#[derive(Debug, Clone)]
pub struct CritiqueTemplate {
    pub text: TextTemplate,
    pub fewshot_cap: usize,
}

impl CritiqueTemplate {
    pub fn load(path: &Path) -> Result<Self, MathselError> {
        let text = TextTemplate::load(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let fewshot_cap = if name.contains("cotpal") { 2 } else { 6 };
        Ok(Self { text, fewshot_cap })
    }

    /// Number of examples actually used for a request of `requested`.
    pub fn clamp_fewshot(&self, requested: usize) -> usize {
        if requested > self.fewshot_cap {
            tracing::warn!(
                requested,
                cap = self.fewshot_cap,
                prompt = %self.text.path.display(),
                "few-shot count above the prompt's maximum, clamping"
            );
            self.fewshot_cap
        } else {
            requested
        }
    }

    /// Render for `question` with `requested` examples. Counts strictly
    /// between zero and the cap keep a random subset; zero keeps all.
    pub fn render<R: Rng + ?Sized>(&self, question: &str, requested: usize, rng: &mut R) -> String {
        let k = self.clamp_fewshot(requested);
        let raw = if k > 0 && k < self.fewshot_cap {
            reduce_fewshots(&self.text.raw, k, rng)
        } else {
            self.text.raw.clone()
        };
        render(&raw, &[("QUESTION", question)])
    }
}

/// Keep the header and the query chunk, and `k` randomly chosen examples
/// from between them.
pub fn reduce_fewshots<R: Rng + ?Sized>(raw: &str, k: usize, rng: &mut R) -> String {
    let chunks: Vec<&str> = raw.split(CRITIQUE_CHUNK_SEPARATOR).collect();
    if chunks.len() < 3 {
        return raw.to_string();
    }
    let last = chunks.len() - 1;
    let mut examples: Vec<&str> = chunks[1..last].to_vec();
    examples.shuffle(rng);
    examples.truncate(k);

    std::iter::once(chunks[0])
        .chain(examples)
        .chain(std::iter::once(chunks[last]))
        .collect::<Vec<_>>()
        .join(CRITIQUE_CHUNK_SEPARATOR)
}
