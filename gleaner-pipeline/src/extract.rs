//! Sequential per-chunk extraction.
//!
//! An [`Extractor`] submits chunks to its [`Inference`] handle one at a time,
//! in order, and never has more than one call in flight. Responses are kept
//! verbatim (an empty response means "nothing matched in this chunk") and
//! joined with `"\n"` in chunk order.

use gleaner_llm::inference::Inference;
use gleaner_llm::traits::InferenceError;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Receives a callback after every processed chunk.
///
/// `index` is 1-based; `total` is the number of chunks in the request.
pub trait ProgressObserver: Send + Sync {
    fn on_chunk(&self, index: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_chunk(&self, index: usize, total: usize) {
        self(index, total)
    }
}

/// Logs progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn on_chunk(&self, index: usize, total: usize) {
        info!(target: "pipeline.extract", index, total, "extracted chunk {index} of {total}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Complete,
    /// Stopped between chunks; `processed` responses were collected.
    Cancelled { processed: usize, total: usize },
}

/// Per-chunk responses of one request, in chunk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    responses: Vec<String>,
    status: ExtractionStatus,
}

impl Extraction {
    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    pub fn status(&self) -> ExtractionStatus {
        self.status
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.status, ExtractionStatus::Cancelled { .. })
    }

    /// Responses joined with a single `"\n"`.
    pub fn output(&self) -> String {
        self.responses.join("\n")
    }

    pub fn into_responses(self) -> Vec<String> {
        self.responses
    }
}

#[derive(Debug, Error)]
#[error("extraction failed at chunk {chunk_index} of {total}: {source}")]
pub struct ExtractionFailed {
    /// 1-based position of the chunk whose inference call failed.
    pub chunk_index: usize,
    pub total: usize,
    #[source]
    pub source: InferenceError,
}

pub struct Extractor {
    inference: Arc<dyn Inference>,
    observer: Option<Arc<dyn ProgressObserver>>,
    cancel: CancellationToken,
}

impl Extractor {
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self {
            inference,
            observer: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `description` against every chunk in order.
    ///
    /// Cancellation is observed before each submission. A cancelled request
    /// is not an error: it returns the responses gathered so far with
    /// [`ExtractionStatus::Cancelled`].
    pub async fn extract<S>(
        &self,
        chunks: &[S],
        description: &str,
    ) -> Result<Extraction, ExtractionFailed>
    where
        S: AsRef<str> + Sync,
    {
        let total = chunks.len();
        let mut responses = Vec::with_capacity(total);

        for (offset, chunk) in chunks.iter().enumerate() {
            let index = offset + 1;
            if self.cancel.is_cancelled() {
                info!(
                    target: "pipeline.extract",
                    processed = offset,
                    total,
                    "extraction cancelled"
                );
                return Ok(Extraction {
                    responses,
                    status: ExtractionStatus::Cancelled {
                        processed: offset,
                        total,
                    },
                });
            }

            let chunk = chunk.as_ref();
            debug!(target: "pipeline.extract", index, total, len = chunk.len(), "submitting chunk");
            let response = self
                .inference
                .infer(chunk, description)
                .await
                .map_err(|source| ExtractionFailed {
                    chunk_index: index,
                    total,
                    source,
                })?;
            debug!(target: "pipeline.extract", index, response_len = response.len(), "chunk done");
            responses.push(response);

            if let Some(observer) = &self.observer {
                observer.on_chunk(index, total);
            }
        }

        Ok(Extraction {
            responses,
            status: ExtractionStatus::Complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the uppercased chunk and optionally cancels after `cancel_after` calls.
    struct Upper {
        calls: AtomicUsize,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl Upper {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                cancel_after: None,
            }
        }
    }

    #[async_trait]
    impl Inference for Upper {
        async fn infer(&self, chunk: &str, _description: &str) -> gleaner_llm::traits::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((after, token)) = &self.cancel_after {
                if n == *after {
                    token.cancel();
                }
            }
            Ok(chunk.to_uppercase())
        }
    }

    #[tokio::test]
    async fn joins_responses_in_order() {
        let extractor = Extractor::new(Arc::new(Upper::new()));
        let out = extractor.extract(&["a", "b", "c"], "d").await.unwrap();
        assert_eq!(out.status(), ExtractionStatus::Complete);
        assert!(!out.is_partial());
        assert_eq!(out.output(), "A\nB\nC");
    }

    #[tokio::test]
    async fn no_chunks_means_no_calls() {
        let inference = Arc::new(Upper::new());
        let extractor = Extractor::new(inference.clone());
        let out = extractor.extract::<&str>(&[], "d").await.unwrap();
        assert_eq!(out.output(), "");
        assert!(out.responses().is_empty());
        assert_eq!(inference.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn observer_sees_every_chunk() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let extractor = Extractor::new(Arc::new(Upper::new()))
            .with_observer(Arc::new(move |i: usize, n: usize| sink.lock().unwrap().push((i, n))));
        extractor.extract(&["x", "y"], "d").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn cancellation_returns_partial_result() {
        let token = CancellationToken::new();
        let inference = Arc::new(Upper {
            calls: AtomicUsize::new(0),
            cancel_after: Some((2, token.clone())),
        });
        let extractor = Extractor::new(inference.clone()).with_cancellation(token);
        let out = extractor.extract(&["a", "b", "c", "d"], "q").await.unwrap();

        assert!(out.is_partial());
        assert_eq!(
            out.status(),
            ExtractionStatus::Cancelled {
                processed: 2,
                total: 4
            }
        );
        assert_eq!(out.responses(), ["A", "B"]);
        assert_eq!(inference.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start_submits_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let inference = Arc::new(Upper::new());
        let extractor = Extractor::new(inference.clone()).with_cancellation(token);
        let out = extractor.extract(&["a"], "q").await.unwrap();
        assert_eq!(
            out.status(),
            ExtractionStatus::Cancelled {
                processed: 0,
                total: 1
            }
        );
        assert_eq!(inference.calls.load(Ordering::SeqCst), 0);
    }
}
