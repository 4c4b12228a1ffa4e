use async_trait::async_trait;
use gleaner_http::HttpError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub tokens_used: Option<u32>,
}

/// Failure of the model backend for a single call.
#[derive(thiserror::Error, Debug)]
pub enum InferenceError {
    #[error("model backend unreachable: {0}")]
    Unreachable(String),

    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("model backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("model not available: {0}")]
    ModelNotAvailable(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl InferenceError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            InferenceError::Unreachable(_) | InferenceError::Timeout(_) => true,
            InferenceError::Backend { status, .. } => *status == 429 || *status >= 500,
            InferenceError::Malformed(_)
            | InferenceError::ModelNotAvailable(_)
            | InferenceError::Config(_) => false,
        }
    }
}

impl From<HttpError> for InferenceError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Network(msg) => InferenceError::Unreachable(msg),
            HttpError::Timeout(after) => InferenceError::Timeout(after),
            HttpError::Status { status, message } => InferenceError::Backend {
                status: status.as_u16(),
                message,
            },
            HttpError::Decode(msg, snippet) => {
                InferenceError::Malformed(format!("{msg} (body: {snippet})"))
            }
            HttpError::Url(msg) | HttpError::Build(msg) => InferenceError::Config(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, InferenceError>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse>;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}
