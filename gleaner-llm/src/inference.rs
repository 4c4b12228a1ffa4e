//! The per-chunk inference boundary used by the extraction pipeline.
//!
//! [`Inference`] is narrower than [`LlmClient`]: it takes the two
//! inputs an extraction call carries (chunk text and description) and returns
//! the model's text verbatim. [`PromptedInference`] adapts any `LlmClient`,
//! and [`RetryingInference`] adds an opt-in retry policy around any
//! `Inference`.

use crate::prompt::render_extraction_prompt;
use crate::traits::{LlmClient, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Inference: Send + Sync {
    /// Run one extraction over `chunk` for `description`.
    async fn infer(&self, chunk: &str, description: &str) -> Result<String>;
}

#[async_trait]
impl<T: Inference + ?Sized> Inference for Arc<T> {
    async fn infer(&self, chunk: &str, description: &str) -> Result<String> {
        (**self).infer(chunk, description).await
    }
}

/// Renders the extraction prompt and sends it to an [`LlmClient`].
pub struct PromptedInference {
    client: Arc<dyn LlmClient + Send + Sync>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl PromptedInference {
    pub fn new(client: Arc<dyn LlmClient + Send + Sync>) -> Self {
        Self {
            client,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

#[async_trait]
impl Inference for PromptedInference {
    async fn infer(&self, chunk: &str, description: &str) -> Result<String> {
        let prompt = render_extraction_prompt(chunk, description);
        let response = self
            .client
            .generate(&prompt, None, self.max_tokens, self.temperature)
            .await?;
        tracing::debug!(
            target: "llm.inference",
            model = self.client.model_name(),
            tokens_used = ?response.tokens_used,
            "chunk inferred"
        );
        Ok(response.text)
    }
}

/// Exponential backoff for transient inference failures.
///
/// ```
/// use gleaner_llm::inference::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(100));
/// assert_eq!(policy.delay(1), Duration::from_millis(100));
/// assert_eq!(policy.delay(3), Duration::from_millis(400));
/// assert_eq!(RetryPolicy::default().max_retries, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: usize) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1) as u32)
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Retries transient failures of the wrapped [`Inference`].
///
/// Errors that [`is_transient`](crate::traits::InferenceError::is_transient)
/// rejects surface immediately; once the budget is spent, the last error is
/// returned unchanged.
pub struct RetryingInference<I> {
    inner: I,
    policy: RetryPolicy,
}

impl<I: Inference> RetryingInference<I> {
    pub fn new(inner: I, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<I: Inference> Inference for RetryingInference<I> {
    async fn infer(&self, chunk: &str, description: &str) -> Result<String> {
        let mut attempt = 0usize;
        loop {
            match self.inner.infer(chunk, description).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay(attempt);
                    tracing::warn!(
                        target: "llm.retry",
                        attempt,
                        max_retries = self.policy.max_retries,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying inference"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
