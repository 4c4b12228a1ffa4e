use async_trait::async_trait;
use gleaner_common::{FetchConfig, FetchMode};
use gleaner_drivers::browser::driver::{DriverOptions, GleanerDriver};
use gleaner_http::{HttpClient, HttpError, RequestOpts};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// An HTML document as returned for one URL.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Final URL after redirects (HTTP) or navigation (browser).
    pub url: Url,
    pub html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("could not reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} returned an empty response")]
    Empty { url: String },

    #[error("browser failed to load {url}: {reason}")]
    Browser { url: String, reason: String },

    #[error("could not set up the page fetcher: {0}")]
    Setup(String),
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawPage, FetchError>;
}

/// Parse `raw` and accept only `http`/`https` targets.
pub fn parse_target(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

fn ensure_not_empty(url: &Url, html: String) -> Result<RawPage, FetchError> {
    if html.trim().is_empty() {
        return Err(FetchError::Empty {
            url: url.to_string(),
        });
    }
    Ok(RawPage {
        url: url.clone(),
        html,
    })
}

/// Plain HTTP GET via [`HttpClient`]; scripts on the page are not executed.
pub struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = match &config.user_agent {
            Some(agent) => HttpClient::with_user_agent(agent),
            None => HttpClient::new(),
        }
        .map_err(|e| FetchError::Setup(e.to_string()))?
        .with_timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .with_retries(config.retries);
        Ok(Self::new(client))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
        let target = parse_target(url)?;
        let resp = self
            .client
            .get_text(target.as_str(), RequestOpts::default())
            .await
            .map_err(|err| match err {
                HttpError::Status { status, .. } => FetchError::Status {
                    url: target.to_string(),
                    status: status.as_u16(),
                },
                HttpError::Url(reason) => FetchError::InvalidUrl {
                    url: target.to_string(),
                    reason,
                },
                other => FetchError::Unreachable {
                    url: target.to_string(),
                    reason: other.to_string(),
                },
            })?;

        tracing::debug!(
            target: "pipeline.fetch",
            url = %resp.url,
            content_type = ?resp.content_type,
            bytes = resp.body.len(),
            "fetched over http"
        );
        ensure_not_empty(&resp.url, resp.body)
    }
}

/// Loads the page in a WebDriver-controlled browser and reads its source.
pub struct BrowserFetcher {
    options: DriverOptions,
}

impl BrowserFetcher {
    pub fn new(options: DriverOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(DriverOptions {
            webdriver_url: config.webdriver_url.clone(),
            headless: config.headless,
            page_load_timeout: Duration::from_secs(config.timeout_secs.max(1)),
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
        let target = parse_target(url)?;
        let browser_err = |e: anyhow::Error| FetchError::Browser {
            url: target.to_string(),
            reason: format!("{e:#}"),
        };

        let mut driver = GleanerDriver::new(&self.options)
            .await
            .map_err(browser_err)?;

        let loaded = async {
            let page = driver.goto(target.as_str()).await?;
            let html = page.get_content().await?;
            let final_url = page.get_url().await?;
            let title = page.get_title().await.unwrap_or_default();
            Ok::<_, anyhow::Error>((html, final_url, title))
        }
        .await;

        // Always attempt to close the session before returning
        if let Err(e) = driver.close().await {
            tracing::warn!(target: "pipeline.fetch", error = %e, "failed to close webdriver session");
        }

        let (html, final_url, title) = loaded.map_err(browser_err)?;
        let final_url = Url::parse(&final_url).unwrap_or_else(|_| target.clone());
        tracing::debug!(
            target: "pipeline.fetch",
            url = %final_url,
            %title,
            bytes = html.len(),
            "fetched via browser"
        );
        ensure_not_empty(&final_url, html)
    }
}

/// Build the fetcher selected by `config.mode`.
pub fn fetcher_from_config(config: &FetchConfig) -> Result<Arc<dyn PageFetcher>, FetchError> {
    Ok(match config.mode {
        FetchMode::Http => Arc::new(HttpFetcher::from_config(config)?),
        FetchMode::Browser => Arc::new(BrowserFetcher::from_config(config)),
    })
}
