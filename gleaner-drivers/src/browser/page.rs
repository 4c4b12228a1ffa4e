use anyhow::Result;
use fantoccini::{Client, Locator};
use tracing::debug;

/// High-level page wrapper over a navigated WebDriver session.
pub struct GleanerPage {
    pub(crate) client: Client,
}

impl GleanerPage {
    /// Construct a page wrapper around an existing WebDriver client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Navigate to `url` and wait until a `<body>` element exists.
    pub async fn goto(&mut self, url: &str) -> Result<()> {
        self.client.goto(url).await.map_err(anyhow::Error::from)?;
        self.client
            .wait()
            .for_element(Locator::Css("body"))
            .await
            .map_err(anyhow::Error::from)?;
        debug!(target: "browser.page", %url, "page loaded");
        Ok(())
    }

    /// Return the full page HTML source.
    pub async fn get_content(&self) -> Result<String> {
        self.client.source().await.map_err(anyhow::Error::msg)
    }

    /// Return the page title.
    pub async fn get_title(&self) -> Result<String> {
        self.client.title().await.map_err(anyhow::Error::msg)
    }

    /// Return the current page URL.
    pub async fn get_url(&self) -> Result<String> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(anyhow::Error::msg)
    }
}
