//! Language model integration for Gleaner.
//!
//! This crate exposes a common [`traits::LlmClient`] interface, a concrete
//! Ollama client for local inference, and the narrower per-chunk
//! [`inference::Inference`] boundary the extraction pipeline is written
//! against. It also provides a convenience function to initialize a client
//! from a [`gleaner_common::LlmConfig`].
//!
//! # Examples
//! ```no_run
//! use gleaner_common::LlmConfig;
//! use gleaner_llm::ensure_llm_ready;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), gleaner_llm::traits::InferenceError> {
//! let client = ensure_llm_ready(&LlmConfig::default()).await?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
pub mod inference;
pub mod ollama;
pub mod prompt;
pub mod traits;

use gleaner_common::{LlmConfig, LlmProvider};
use inference::{Inference, PromptedInference, RetryPolicy, RetryingInference};
use ollama::{OllamaClient, OllamaOptions};
use std::sync::Arc;
use std::time::Duration;
use traits::LlmClient;

/// Ensure an LLM client is ready (e.g., downloading models if needed).
pub async fn ensure_llm_ready(
    config: &LlmConfig,
) -> traits::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    match config.provider {
        LlmProvider::Ollama => {
            let options = OllamaOptions {
                request_timeout: Duration::from_secs(config.timeout_secs.max(1)),
                pull_missing: config.pull_missing,
            };
            let client = OllamaClient::connect(&config.endpoint, &config.model, options).await?;
            tracing::info!(
                target: "llm",
                endpoint = %config.endpoint,
                model = %config.model,
                "language model ready"
            );
            Ok(Arc::new(client))
        }
    }
}

/// Build the per-chunk [`Inference`] handle for `client`.
///
/// A zero retry budget returns the plain prompted adapter; otherwise it is
/// wrapped in [`RetryingInference`].
pub fn extraction_inference(
    client: Arc<dyn LlmClient + Send + Sync>,
    config: &LlmConfig,
    retry: RetryPolicy,
) -> Arc<dyn Inference> {
    let prompted = PromptedInference::new(client)
        .with_max_tokens(config.max_tokens)
        .with_temperature(config.temperature);
    if retry.max_retries == 0 {
        Arc::new(prompted)
    } else {
        Arc::new(RetryingInference::new(prompted, retry))
    }
}
