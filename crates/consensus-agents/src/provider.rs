//! Answer provider capability and the Ollama-backed implementation.
//!
//! Provider failures are a tagged enum so the dispatcher can map every
//! outcome to an `AgentResult` in a single `match`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// One generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model_id: String,
    pub prompt: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_output_tokens: u32,
}

/// Why a provider call produced no usable answer.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The model did not answer within the read timeout.
    #[error("model did not answer within {}s", read_timeout.as_secs())]
    Timeout { read_timeout: Duration },

    /// The model server could not be reached.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectFailure { endpoint: String, reason: String },

    /// The model answered with nothing but whitespace.
    #[error("Empty response from model")]
    EmptyAnswer,

    /// Non-2xx HTTP response.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Anything else: malformed body, client construction, transport errors.
    #[error("{0}")]
    Other(String),
}

/// Generates text for a prompt with a given model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

/// Shared reference to an AnswerProvider
pub type SharedAnswerProvider = Arc<dyn AnswerProvider>;

// ── Ollama ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
}

/// Provider speaking Ollama's non-streaming `/api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    http: HttpClient,
    base_url: String,
    connect_timeout: Duration,
}

impl OllamaProvider {
    /// Build a provider whose pooled client uses `connect_timeout`.
    ///
    /// Requests asking for a different connect timeout get a one-off client.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http: build_client(connect_timeout)?,
            base_url,
            connect_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(
        &self,
        err: reqwest::Error,
        url: &str,
        request: &GenerationRequest,
    ) -> ProviderError {
        if err.is_connect() {
            ProviderError::ConnectFailure {
                endpoint: url.to_string(),
                reason: err.to_string(),
            }
        } else if err.is_timeout() {
            ProviderError::Timeout {
                read_timeout: request.read_timeout,
            }
        } else {
            ProviderError::Other(err.to_string())
        }
    }
}

fn build_client(connect_timeout: Duration) -> Result<HttpClient, ProviderError> {
    HttpClient::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))
}

#[async_trait]
impl AnswerProvider for OllamaProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let http = if request.connect_timeout == self.connect_timeout {
            self.http.clone()
        } else {
            build_client(request.connect_timeout)?
        };

        let url = format!("{}/api/generate", self.base_url);
        debug!(
            url = %url,
            model = %request.model_id,
            read_timeout_secs = request.read_timeout.as_secs(),
            max_output_tokens = request.max_output_tokens,
            "generate request"
        );

        let response = http
            .post(&url)
            .timeout(request.read_timeout)
            .json(&GenerateBody {
                model: &request.model_id,
                prompt: &request.prompt,
                stream: false,
                options: GenerateOptions {
                    num_predict: request.max_output_tokens,
                },
            })
            .send()
            .await
            .map_err(|e| self.classify(e, &url, request))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| self.classify(e, &url, request))?;

        let text = reply.response.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyAnswer);
        }
        Ok(text.to_string())
    }
}
