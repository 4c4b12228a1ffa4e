use crate::chunk::{Chunker, DEFAULT_MAX_CHUNK_LEN, InvalidConfiguration};
use crate::extract::{Extraction, ExtractionFailed, Extractor, ProgressObserver, TracingProgress};
use gleaner_llm::inference::Inference;
use gleaner_web::{FetchError, NormalizedPage, PageFetcher, normalize_page};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Step of a request that produced a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Chunk,
    Extract,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Chunk => "chunk",
            Stage::Extract => "extract",
        })
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Chunk(#[from] InvalidConfiguration),
    #[error(transparent)]
    Extract(#[from] ExtractionFailed),
}

#[derive(Debug, Error)]
pub struct PipelineError {
    pub stage: Stage,
    /// Target URL, absent when extracting over supplied text.
    pub url: Option<String>,
    #[source]
    pub source: StageError,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{} failed for {url}: {}", self.stage, self.source),
            None => write!(f, "{} failed: {}", self.stage, self.source),
        }
    }
}

impl PipelineError {
    fn new(stage: Stage, url: Option<&str>, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            url: url.map(str::to_owned),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_chunk_len: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
        }
    }
}

impl PipelineOptions {
    /// Reject a bad chunk budget without running anything.
    ///
    /// ```
    /// use gleaner_pipeline::{PipelineOptions, Stage};
    ///
    /// assert!(PipelineOptions::default().validate().is_ok());
    /// let err = PipelineOptions { max_chunk_len: 0 }.validate().unwrap_err();
    /// assert_eq!(err.stage, Stage::Chunk);
    /// ```
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.chunker(None).map(|_| ())
    }

    fn chunker(&self, url: Option<&str>) -> Result<Chunker, PipelineError> {
        Chunker::new(self.max_chunk_len).map_err(|e| PipelineError::new(Stage::Chunk, url, e))
    }
}

/// Fetch `url` with `fetcher` and normalize it, without running extraction.
pub async fn scrape_page(
    fetcher: &dyn PageFetcher,
    url: &str,
) -> Result<NormalizedPage, PipelineError> {
    let raw = fetcher
        .fetch(url)
        .await
        .map_err(|e| PipelineError::new(Stage::Fetch, Some(url), e))?;

    let page = normalize_page(&raw.html);
    info!(
        target: "pipeline.fetch",
        url = %raw.url,
        title = page.title.as_deref().unwrap_or(""),
        html_len = raw.html.len(),
        text_len = page.text.len(),
        "page normalized"
    );
    Ok(page)
}

/// Fetch, normalize, chunk and extract, wired from injected collaborators.
///
/// A `Pipeline` holds no per-request state and can serve any number of
/// requests, concurrently or in turn; each call owns its text, chunks,
/// responses and cancellation.
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    inference: Arc<dyn Inference>,
    options: PipelineOptions,
    observer: Arc<dyn ProgressObserver>,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn PageFetcher>, inference: Arc<dyn Inference>) -> Self {
        Self {
            fetcher,
            inference,
            options: PipelineOptions::default(),
            observer: Arc::new(TracingProgress),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Fetch `url` and extract `description` from its visible text.
    pub async fn run(&self, url: &str, description: &str) -> Result<Extraction, PipelineError> {
        self.run_with_cancellation(url, description, &CancellationToken::new())
            .await
    }

    /// [`Pipeline::run`], stopping between chunks once `cancel` fires.
    ///
    /// The token belongs to this request only; other requests on the same
    /// pipeline are unaffected.
    pub async fn run_with_cancellation(
        &self,
        url: &str,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<Extraction, PipelineError> {
        // Reject a bad chunk budget before touching the network.
        self.options.chunker(Some(url))?;
        let text = self.scrape(url).await?;
        self.extract_inner(&text, description, Some(url), cancel)
            .await
    }

    /// Fetch `url` and return its clean text without running extraction.
    pub async fn scrape(&self, url: &str) -> Result<String, PipelineError> {
        scrape_page(self.fetcher.as_ref(), url)
            .await
            .map(|page| page.text)
    }

    /// Extract `description` from already-scraped `clean_text`.
    pub async fn extract_text(
        &self,
        clean_text: &str,
        description: &str,
    ) -> Result<Extraction, PipelineError> {
        self.extract_text_with_cancellation(clean_text, description, &CancellationToken::new())
            .await
    }

    /// [`Pipeline::extract_text`], stopping between chunks once `cancel` fires.
    pub async fn extract_text_with_cancellation(
        &self,
        clean_text: &str,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<Extraction, PipelineError> {
        self.extract_inner(clean_text, description, None, cancel)
            .await
    }

    async fn extract_inner(
        &self,
        text: &str,
        description: &str,
        url: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Extraction, PipelineError> {
        let chunker = self.options.chunker(url)?;
        let chunks: Vec<&str> = chunker.chunks(text).collect();
        info!(
            target: "pipeline.extract",
            chunks = chunks.len(),
            max_chunk_len = chunker.max_len(),
            "starting extraction"
        );

        Extractor::new(self.inference.clone())
            .with_observer(self.observer.clone())
            .with_cancellation(cancel.clone())
            .extract(&chunks, description)
            .await
            .map_err(|e| PipelineError::new(Stage::Extract, url, e))
    }
}

/// [`Pipeline::run`] with default options.
pub async fn run_pipeline(
    fetcher: Arc<dyn PageFetcher>,
    inference: Arc<dyn Inference>,
    url: &str,
    description: &str,
) -> Result<Extraction, PipelineError> {
    Pipeline::new(fetcher, inference).run(url, description).await
}
