//! Page acquisition and text normalisation.
//!
//! - [`fetch`]: the [`PageFetcher`] boundary with HTTP and browser backends
//! - [`normalize`]: reduce raw HTML to clean, line-oriented body text

pub mod fetch;
pub mod normalize;

pub use fetch::{BrowserFetcher, FetchError, HttpFetcher, PageFetcher, RawPage, fetcher_from_config};
pub use normalize::{NormalizedPage, clean_text, normalize, normalize_page};
