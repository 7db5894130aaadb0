//! Chat-completion client for answer synthesis.
//!
//! [`OpenRouterClient`] posts a single user message to an
//! OpenAI-compatible `/chat/completions` endpoint (OpenRouter by default)
//! with a bounded timeout. Calls are never retried.
//!
//! Failures are typed as [`CompletionError`]; the assistant turns them into
//! user-facing answers with [`CompletionError::user_message`], which gives
//! quota exhaustion (HTTP 402) and rate limiting (HTTP 429) their own
//! actionable text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;

pub const PAYMENT_REQUIRED_MESSAGE: &str = "Payment required or out of quota on OpenRouter. Please top up at https://openrouter.ai/ or use a free model.";
pub const RATE_LIMITED_MESSAGE: &str =
    "Rate limit exceeded on OpenRouter. Please wait or upgrade your API plan.";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("402 Payment Required: {0}")]
    PaymentRequired(String),
    #[error("429 Too Many Requests: {0}")]
    RateLimited(String),
    #[error("HTTP {status} from completion API: {body}")]
    Status { status: u16, body: String },
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// The answer text shown to the user in place of a completion.
    pub fn user_message(&self) -> String {
        match self {
            CompletionError::PaymentRequired(_) => PAYMENT_REQUIRED_MESSAGE.to_string(),
            CompletionError::RateLimited(_) => RATE_LIMITED_MESSAGE.to_string(),
            other => format!("Error: {}", other),
        }
    }

    fn from_status(status: u16, body: String) -> Self {
        match status {
            402 => CompletionError::PaymentRequired(body),
            429 => CompletionError::RateLimited(body),
            _ => CompletionError::Status { status, body },
        }
    }
}

/// Sends a prompt to a remote model and returns its raw text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenRouter (or any OpenAI-compatible) chat-completions client.
///
/// The API key is read from `OPENROUTER_API_KEY`.
pub struct OpenRouterClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY").ok();
        if api_key.is_none() {
            warn!("OPENROUTER_API_KEY not set; completion requests will be rejected upstream");
        }
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(model, prompt_chars = prompt.len(), "requesting completion");
        let response = request
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::from_status(status.as_u16(), body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::InvalidResponse("no choices[0].message.content".into()))
    }
}
