//! Chat-completion backends.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{mentions_rate_limit, ChatError};
use crate::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Completion, CompletionRequest,
};

/// Provider-agnostic completion call.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model name recorded on spend records.
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ChatError>;
}

/// Any OpenAI-compatible `/chat/completions` endpoint (OpenAI, Groq,
/// OpenRouter, local gateways).
pub struct OpenAiCompatBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ChatError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ChatError::NotConfigured(format!(
                "no API key for {} (set CASEFILE_LLM_API_KEY or OPENAI_API_KEY)",
                config.provider
            ))
        })?;
        Self::new(config.base_url(), api_key, config.model.clone(), config.timeout())
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: Some(request.system.clone()),
                },
                ChatMessage {
                    role: "user".into(),
                    content: Some(request.user.clone()),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!("Completion request to {} with model {}", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::Timeout
                } else {
                    ChatError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || mentions_rate_limit(&body) {
                return Err(ChatError::RateLimited(body));
            }
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::InvalidResponse(e.to_string()))?;
        let usage = parsed.usage.unwrap_or_default();
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChatError::InvalidResponse("response has no message content".into()))?;

        Ok(Completion {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}
