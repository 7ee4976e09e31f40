//! Completion capability — the trait both summarization stages call, the
//! model-tier abstraction, and the HTTP-backed implementation.
//!
//! The pipeline never names concrete models. Stages ask for a
//! [`ModelTier`]; the provider maps the tier to whatever model its
//! configuration says, and the reducer derives output budgets from the
//! tier's context-limit constant.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, ProviderConfig};

/// Quality/capacity tier for a completion call.
///
/// Selected once by the orchestrator; lower components receive it as a
/// parameter. The context-limit constants drive the reduce-stage output
/// budget arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTier {
    #[default]
    Standard,
    Premium,
}

impl ModelTier {
    /// Usable context window, in tokens, for budget arithmetic.
    #[must_use]
    pub fn context_limit(self) -> usize {
        match self {
            ModelTier::Standard => 3_800,
            ModelTier::Premium => 7_500,
        }
    }
}

/// One completion invocation: instructions, the text they apply to, and the
/// output budget.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    /// System instructions (an artifact's instruction template, rendered).
    pub instructions: &'a str,
    /// The input text the instructions operate on.
    pub input: &'a str,
    /// Maximum output length, in tokens.
    pub max_output_tokens: usize,
    pub tier: ModelTier,
}

/// Errors from the completion service.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion input exceeded the model context window")]
    ContextLengthExceeded,

    #[error("completion call timed out after {seconds}s")]
    TimedOut { seconds: u64 },

    #[error("completion service error: {0}")]
    Service(String),

    #[error("completion response contained no choices")]
    EmptyResponse,
}

/// Produces text from instructions + input.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short identifier for logs.
    fn id(&self) -> &str;

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError>;
}

// ── HTTP provider ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// OpenAI-style `/chat/completions` endpoint client.
///
/// Maps [`ModelTier::Standard`] and [`ModelTier::Premium`] to the two model
/// names in [`ProviderConfig`]; requests run at temperature zero so
/// repeated runs over identical input stay as stable as the service
/// allows.
pub struct HttpCompletionProvider {
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: String,
    standard_model: String,
    premium_model: String,
}

impl HttpCompletionProvider {
    /// # Errors
    ///
    /// [`ConfigError::InvalidBaseUrl`] when the endpoint cannot be resolved
    /// against the configured base URL.
    pub fn new(config: &ProviderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint("chat/completions")?,
            api_key: config.api_key.clone(),
            standard_model: config.completion_model.clone(),
            premium_model: config.premium_completion_model.clone(),
        })
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.standard_model,
            ModelTier::Premium => &self.premium_model,
        }
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    fn id(&self) -> &str {
        "http-completions"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError> {
        let body = ChatRequestBody {
            model: self.model_for(request.tier),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.instructions,
                },
                ChatMessage {
                    role: "user",
                    content: request.input,
                },
            ],
            max_tokens: request.max_output_tokens,
            temperature: 0.0,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            if let Ok(api_error) = response.json::<ApiErrorBody>().await {
                if api_error.error.code.as_deref() == Some("context_length_exceeded") {
                    return Err(CompletionError::ContextLengthExceeded);
                }
                return Err(CompletionError::Service(format!(
                    "{status}: {}",
                    api_error.error.message
                )));
            }
            return Err(CompletionError::Service(status.to_string()));
        }

        let parsed: ChatResponseBody = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}
