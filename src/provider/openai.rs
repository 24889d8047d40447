// src/provider/openai.rs — OpenAI-compatible chat completions client

use std::time::Duration;

use async_trait::async_trait;

use super::{Completion, CompletionRequest, ModelProvider, StopReason, TokenUsage};
use crate::infra::errors::MathselError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, MathselError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("mathsel/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MathselError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// JSON body for `/chat/completions`.
pub(crate) fn request_body(request: &CompletionRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role.as_str(),
                "content": m.content,
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "top_p": request.top_p,
        "n": request.n,
    });
    if let Some(stop) = &request.stop {
        body["stop"] = serde_json::json!(stop);
    }
    body
}

/// Read `choices[0].message.content` out of a response body. A body without
/// a first choice is malformed and worth another attempt.
pub(crate) fn parse_response(resp: &serde_json::Value) -> Result<Completion, MathselError> {
    let choice = resp["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .ok_or_else(|| MathselError::Provider {
            provider: "openai".into(),
            message: "response has no choices".into(),
            retriable: true,
        })?;

    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| MathselError::Provider {
            provider: "openai".into(),
            message: "first choice has no message content".into(),
            retriable: true,
        })?
        .to_string();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    let stop_reason = match choice["finish_reason"].as_str() {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::Unknown,
    };

    Ok(Completion {
        content,
        usage,
        stop_reason,
    })
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, MathselError> {
        let body = request_body(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| MathselError::Provider {
                provider: "openai".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MathselError::RateLimited {
                provider: "openai".into(),
                retry_after_ms: 5000,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(MathselError::Provider {
                provider: "openai".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| MathselError::Provider {
            provider: "openai".into(),
            message: format!("Failed to parse response: {}", e),
            retriable: true,
        })?;

        let completion = parse_response(&resp)?;
        tracing::debug!(
            model = %request.model,
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "completion received"
        );
        Ok(completion)
    }
}
