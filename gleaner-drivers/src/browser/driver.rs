use crate::browser::page::GleanerPage;
use anyhow::{Context, Result};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use gleaner_common::DEFAULT_WEBDRIVER_URL;
use serde_json::json;
use std::time::Duration;
use webdriver::capabilities::Capabilities;

/// Settings for a browser session.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// WebDriver endpoint, e.g. Chromedriver on `http://localhost:9515`.
    pub webdriver_url: String,
    /// Run the browser without a visible window.
    pub headless: bool,
    /// Upper bound on a single navigation.
    pub page_load_timeout: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            page_load_timeout: Duration::from_secs(30),
        }
    }
}

/// Thin wrapper around a `fantoccini` WebDriver client.
pub struct GleanerDriver {
    pub client: Client,
}

impl GleanerDriver {
    /// Create a new driver connected to a running WebDriver service.
    pub async fn new(options: &DriverOptions) -> Result<Self> {
        let client = ClientBuilder::native()
            .capabilities(chrome_capabilities(options.headless))
            .connect(&options.webdriver_url)
            .await
            .with_context(|| {
                format!(
                    "failed to start a WebDriver session at {}",
                    options.webdriver_url
                )
            })?;

        client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(options.page_load_timeout),
                None,
            ))
            .await
            .context("failed to configure page load timeout")?;

        tracing::debug!(
            target: "browser.driver",
            webdriver_url = %options.webdriver_url,
            headless = options.headless,
            "webdriver session started"
        );

        Ok(Self { client })
    }

    /// Navigate to `url` and return a [`GleanerPage`] over the loaded document.
    pub async fn goto(&mut self, url: &str) -> Result<GleanerPage> {
        let mut page = GleanerPage::new(self.client.clone());
        page.goto(url).await?;
        Ok(page)
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

/// Chrome capabilities for a scraping session.
pub fn chrome_capabilities(headless: bool) -> Capabilities {
    let mut args = vec![
        "--disable-dev-shm-usage",
        "--no-sandbox",
        "--disable-extensions",
    ];
    if headless {
        args.push("--headless");
        args.push("--disable-gpu");
    }

    let mut caps = Capabilities::new();
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    caps
}
