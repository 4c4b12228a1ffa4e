//! The scrape-then-extract pipeline.
//!
//! ```text
//! URL -> PageFetcher -> raw HTML -> normalize -> clean text
//!     -> Chunker -> chunks -> Extractor (x description) -> joined output
//! ```
//!
//! Collaborators are injected: any [`PageFetcher`](gleaner_web::PageFetcher)
//! supplies HTML and any [`Inference`](gleaner_llm::inference::Inference)
//! answers per-chunk prompts. Chunks are extracted strictly one after another.

pub mod chunk;
pub mod extract;
pub mod pipeline;

pub use chunk::{CharCount, Chunker, InvalidConfiguration, Measure, chunk};
pub use extract::{
    Extraction, ExtractionFailed, ExtractionStatus, Extractor, ProgressObserver, TracingProgress,
};
pub use pipeline::{
    Pipeline, PipelineError, PipelineOptions, Stage, StageError, run_pipeline, scrape_page,
};
