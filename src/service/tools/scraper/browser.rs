//! Scraper that renders the page in a headless Chromium.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tracing::{debug, instrument, warn};

use crate::{
    base::{config::Config, types::Res},
    service::tools::GenericTool,
};

use super::{SCRAPER_TOOL_NAME, extract_url, remove_blank_lines};

/// Selector groups read from the rendered page, in output order.
const SECTIONS: [&str; 4] = ["h1, h2, h3, h4, h5, h6", "p", "main#content", "div#content"];

/// Launches a fresh headless browser per call and reads the page once it settles.
#[derive(Clone)]
pub struct BrowserScraper {
    user_agent: String,
    settle: Duration,
    timeout: Duration,
}

impl BrowserScraper {
    #[instrument(name = "BrowserScraper::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        Self {
            user_agent: config.scraper_user_agent.clone(),
            settle: Duration::from_secs(config.browser_settle_secs),
            timeout: Duration::from_secs(config.scraper_timeout_secs),
        }
    }

    async fn scrape(&self, url: &str) -> Res<String> {
        let config = BrowserConfig::builder()
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--disable-http2")
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid browser configuration: {e}"))?;

        let (mut browser, mut handler) = Browser::launch(config).await?;
        let events = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let result = read_page(&browser, url, self.settle).await;

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {e}");
        }
        events.abort();

        result
    }
}

async fn read_page(browser: &Browser, url: &str, settle: Duration) -> Res<String> {
    let page = browser.new_page(url).await?;
    tokio::time::sleep(settle).await;

    let mut parts = Vec::with_capacity(SECTIONS.len());
    for css in SECTIONS {
        parts.push(section_text(&page, css).await?);
    }

    Ok(remove_blank_lines(&parts.join("\n")))
}

async fn section_text(page: &Page, css: &str) -> Res<String> {
    let mut text = String::new();

    for element in page.find_elements(css).await.unwrap_or_default() {
        if let Some(inner) = element.inner_text().await? {
            text.push_str(&inner);
            text.push('\n');
        }
    }

    Ok(text)
}

#[async_trait]
impl GenericTool for BrowserScraper {
    fn name(&self) -> &str {
        SCRAPER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Web Scraper will scan a url and return the content of the web page. Input should be a working url."
    }

    #[instrument(name = "BrowserScraper::call", skip_all)]
    async fn call(&self, input: &str) -> Res<String> {
        let url = extract_url(input)?;
        debug!("Rendering {url}.");

        tokio::time::timeout(self.timeout, self.scrape(&url))
            .await
            .map_err(|_| anyhow::anyhow!("Scraping `{url}` timed out after {:?}.", self.timeout))?
    }
}
