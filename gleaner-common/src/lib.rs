//! Common types and utilities shared across Gleaner crates.
//!
//! This crate holds the pieces every other crate leans on: the model and
//! fetch settings, and the tracing setup in [`observability`]. It stays small so the leaf crates can depend on it
//! without pulling in the HTTP or browser stacks.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`LlmConfig`]: Provider-agnostic model configuration
//! - [`FetchConfig`] and [`FetchMode`]: How raw HTML is acquired for a URL
//!
//! # Examples
//!
//! ```rust
//! use gleaner_common::FetchMode;
//!
//! assert_eq!(FetchMode::default(), FetchMode::Http);
//! assert_eq!(FetchMode::Browser.to_string(), "browser");
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod observability;

/// Default WebDriver endpoint (Chromedriver's default port).
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Default local model; small enough for CPU-only hosts.
pub const DEFAULT_OLLAMA_MODEL: &str = "gemma3:1b";

/// Language model backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Ollama,
}

/// Provider-agnostic LLM configuration.
///
/// This is the single source of truth for model settings: the config file
/// schema embeds it directly and `gleaner-llm` builds clients from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Per-request timeout for a single generation call.
    pub timeout_secs: u64,
    /// Pull the model on connect when the server does not have it yet.
    pub pull_missing: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout_secs: 120,
            pull_missing: true,
        }
    }
}

/// How raw page HTML is acquired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Plain HTTP GET; no JavaScript is executed.
    #[default]
    Http,
    /// WebDriver-backed browser session; the page source after load is used.
    Browser,
}

/// Page acquisition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub mode: FetchMode,
    /// Per-request timeout (HTTP) or page-load timeout (browser).
    pub timeout_secs: u64,
    /// Retries for transient HTTP failures. Zero disables retrying.
    pub retries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub webdriver_url: String,
    pub headless: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::Http,
            timeout_secs: 30,
            retries: 0,
            user_agent: None,
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Http => f.write_str("http"),
            FetchMode::Browser => f.write_str("browser"),
        }
    }
}
