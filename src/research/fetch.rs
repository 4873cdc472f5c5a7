//! Page fetching and HTML-to-text reduction.

use crate::error::{ReelsmithError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Fetches a page and returns its readable text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`; any non-200 status, network error or timeout is an `Err`.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// reqwest-backed fetcher. Timeouts come from the shared client.
pub struct HttpPageFetcher {
    http: reqwest::Client,
    max_chars: usize,
}

impl HttpPageFetcher {
    pub fn new(http: reqwest::Client, max_chars: usize) -> Self {
        Self { http, max_chars }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(ReelsmithError::Fetch(format!("{} returned {}", url, response.status())));
        }
        let html = response.text().await?;
        let text = html_to_text(&html);
        debug!("Fetched {} ({} chars of text)", url, text.len());
        Ok(super::truncate_chars(&text, self.max_chars).to_string())
    }
}

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("Invalid regex"));
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("Invalid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Reduce an HTML document to whitespace-collapsed visible text.
pub fn html_to_text(html: &str) -> String {
    let text = STYLE_BLOCK.replace_all(html, " ");
    let text = SCRIPT_BLOCK.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_strips_markup() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <script type="text/javascript">var x = "<b>";</script></head>
            <body><h1>Release&nbsp;notes</h1>
            <p>Faster   builds &amp; smaller binaries.</p></body></html>"#;
        assert_eq!(html_to_text(html), "Release notes Faster builds & smaller binaries.");
    }

    #[test]
    fn test_html_to_text_plain_input() {
        assert_eq!(html_to_text("  just\ntext  "), "just text");
    }
}
