//! Scraper that fetches a page over HTTP and queries its DOM.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use crate::{
    base::{config::Config, types::Res},
    service::tools::GenericTool,
};

use super::{SCRAPER_TOOL_NAME, extract_url, remove_blank_lines};

/// Fetches the page with `reqwest` and renders it with CSS selectors.
///
/// No JavaScript runs, so client-rendered pages come back mostly empty. Use the
/// browser scraper for those.
#[derive(Clone)]
pub struct DomScraper {
    client: reqwest::Client,
    blacklist: Vec<String>,
}

impl DomScraper {
    #[instrument(name = "DomScraper::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.scraper_user_agent)
            .timeout(Duration::from_secs(config.scraper_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            blacklist: config.scraper_blacklist.clone(),
        })
    }

    /// Replace the path fragments that exclude a link.
    pub fn with_blacklist(mut self, blacklist: Vec<String>) -> Self {
        self.blacklist = blacklist;
        self
    }
}

#[async_trait]
impl GenericTool for DomScraper {
    fn name(&self) -> &str {
        SCRAPER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Web Scraper will scan a URL and return the content of the web page. Input should be a working URL."
    }

    #[instrument(name = "DomScraper::call", skip_all)]
    async fn call(&self, input: &str) -> Res<String> {
        let raw_url = extract_url(input)?;
        let url = Url::parse(&raw_url).map_err(|e| anyhow::anyhow!("Scraper could not read URL `{raw_url}`: {e}"))?;

        debug!("Scraping {url}.");

        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        let body = response.text().await?;

        render_page(&url, &body, &self.blacklist)
    }
}

// Rendering.

fn selector(css: &str) -> Res<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector `{css}`: {e}"))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Render the readable parts of an HTML page as text.
///
/// Links are resolved against `page_url`. Only links on the same host whose path
/// contains none of the `blacklist` fragments are kept, de-duplicated in the order
/// they appear.
pub fn render_page(page_url: &Url, html: &str, blacklist: &[String]) -> Res<String> {
    let document = Html::parse_document(html);
    let mut out = vec![format!("Page URL: {page_url}")];

    if let Some(title) = document.select(&selector("title")?).next().map(element_text) {
        if !title.trim().is_empty() {
            out.push(format!("Page Title: {}", title.trim()));
        }
    }

    let description = document.select(&selector("meta[name='description']")?).next().and_then(|meta| meta.value().attr("content"));
    if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
        out.push(format!("Page Description: {}", description.trim()));
    }

    out.push("Headers:".to_string());
    out.extend(document.select(&selector("h1, h2, h3, h4, h5, h6")?).map(element_text));

    out.push("Content:".to_string());
    out.extend(document.select(&selector("p")?).map(element_text));
    out.extend(document.select(&selector("div#content")?).map(|e| format!("content:{}", element_text(e))));
    out.extend(document.select(&selector("main#content")?).map(|e| format!("content:{}", element_text(e))));

    let links = same_host_links(page_url, &document, blacklist)?;
    if !links.is_empty() {
        out.push("Scraped Links:".to_string());
        out.extend(links);
    }

    Ok(remove_blank_lines(&out.join("\n")))
}

fn same_host_links(page_url: &Url, document: &Html, blacklist: &[String]) -> Res<Vec<String>> {
    let mut links: Vec<String> = Vec::new();

    for anchor in document.select(&selector("a[href]")?) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        let Ok(mut link) = page_url.join(href) else {
            debug!("Skipping unparseable link `{href}`.");
            continue;
        };

        if link.host_str() != page_url.host_str() {
            continue;
        }

        if blacklist.iter().any(|fragment| link.path().contains(fragment.as_str())) {
            continue;
        }

        if link.path() == "/index.html" || link.path().is_empty() {
            link.set_path("/");
        }

        let link = link.to_string();
        if !links.contains(&link) {
            links.push(link);
        }
    }

    Ok(links)
}

// Tests.
