//! Web scraping tools.
//!
//! Both scrapers accept free text, pick the first http(s) URL out of it, and
//! return the readable text of that page.

#[cfg(feature = "browser")]
pub mod browser;
pub mod dom;

use regex::Regex;

use crate::base::types::Res;

/// Name both scrapers advertise.
pub const SCRAPER_TOOL_NAME: &str = "Web Scraper";

/// Find the first http(s) URL in `input`.
///
/// A trailing `>` is dropped so that `<https://...>` style links work.
pub fn extract_url(input: &str) -> Res<String> {
    let re = Regex::new(r"https?://[^\s]+")?;

    let found = re.find(input).ok_or_else(|| anyhow::anyhow!("No URL found in `{input}`."))?;
    let url = found.as_str();

    Ok(url.strip_suffix('>').unwrap_or(url).to_string())
}

/// Drop whitespace-only lines and trailing newlines.
pub fn remove_blank_lines(input: &str) -> String {
    input.lines().filter(|line| !line.trim().is_empty()).collect::<Vec<_>>().join("\n")
}

// Tests.
