//! REST adapters for the supported search backends.
//!
//! Each adapter maps its vendor payload onto [`SearchHit`], assigning
//! positions in the order the provider returned them.

use super::{SearchHit, SearchProvider};
use crate::error::{ReelsmithError, Result};
use crate::config::env_key;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

/// Send a GET request and decode the JSON body, mapping non-2xx to a search error.
async fn get_json(request: reqwest::RequestBuilder, provider: &str) -> Result<Value> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ReelsmithError::Search(format!(
            "{} returned {}: {}",
            provider,
            status,
            body.chars().take(300).collect::<String>()
        )));
    }
    Ok(response.json().await?)
}

/// Map a JSON array of result objects onto hits using the given field names.
fn hits_from(items: Option<&Value>, title: &str, url: &str, snippet: &str, limit: usize) -> Vec<SearchHit> {
    let Some(items) = items.and_then(Value::as_array) else {
        return Vec::new();
    };

    let field = |item: &Value, key: &str| item.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

    items
        .iter()
        .take(limit)
        .enumerate()
        .map(|(position, item)| SearchHit {
            title: field(item, title),
            url: field(item, url),
            snippet: field(item, snippet),
            position,
        })
        .filter(|hit| !hit.url.is_empty())
        .collect()
}

/// Google Custom Search JSON API.
pub struct GoogleSearch {
    http: reqwest::Client,
    api_key: String,
    cx: String,
}

impl GoogleSearch {
    const BASE_URL: &'static str = "https://www.googleapis.com/customsearch/v1";

    pub fn from_env(http: reqwest::Client) -> Result<Self> {
        Ok(Self {
            http,
            api_key: env_key("GOOGLE_SEARCH_API_KEY")?,
            cx: env_key("GOOGLE_SEARCH_CX")?,
        })
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let num = max_results.min(10).to_string();
        let request = self.http.get(Self::BASE_URL).query(&[
            ("key", self.api_key.as_str()),
            ("cx", self.cx.as_str()),
            ("q", query),
            ("num", num.as_str()),
        ]);
        let data = get_json(request, "google").await?;
        let hits = hits_from(data.get("items"), "title", "link", "snippet", max_results);
        debug!("google returned {} hits", hits.len());
        Ok(hits)
    }

    fn provider_name(&self) -> &str {
        "google"
    }
}

/// Bing Web Search v7.
pub struct BingSearch {
    http: reqwest::Client,
    api_key: String,
}

impl BingSearch {
    const BASE_URL: &'static str = "https://api.bing.microsoft.com/v7.0/search";

    pub fn from_env(http: reqwest::Client) -> Result<Self> {
        Ok(Self {
            http,
            api_key: env_key("BING_SEARCH_API_KEY")?,
        })
    }
}

#[async_trait]
impl SearchProvider for BingSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let count = max_results.min(50).to_string();
        let request = self
            .http
            .get(Self::BASE_URL)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&[("q", query), ("count", count.as_str()), ("mkt", "en-US")]);
        let data = get_json(request, "bing").await?;
        Ok(hits_from(
            data.pointer("/webPages/value"),
            "name",
            "url",
            "snippet",
            max_results,
        ))
    }

    fn provider_name(&self) -> &str {
        "bing"
    }
}

/// SerpAPI (Google results).
pub struct SerpApiSearch {
    http: reqwest::Client,
    api_key: String,
}

impl SerpApiSearch {
    const BASE_URL: &'static str = "https://serpapi.com/search";

    pub fn from_env(http: reqwest::Client) -> Result<Self> {
        Ok(Self {
            http,
            api_key: env_key("SERPAPI_KEY")?,
        })
    }
}

#[async_trait]
impl SearchProvider for SerpApiSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let num = max_results.min(10).to_string();
        let request = self.http.get(Self::BASE_URL).query(&[
            ("q", query),
            ("api_key", self.api_key.as_str()),
            ("engine", "google"),
            ("num", num.as_str()),
        ]);
        let data = get_json(request, "serpapi").await?;
        Ok(hits_from(
            data.get("organic_results"),
            "title",
            "link",
            "snippet",
            max_results,
        ))
    }

    fn provider_name(&self) -> &str {
        "serpapi"
    }
}

/// Self-hosted Searx/SearXNG instance.
pub struct SearxSearch {
    http: reqwest::Client,
    base_url: String,
}

impl SearxSearch {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for SearxSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let request = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json"), ("categories", "general")]);
        let data = get_json(request, "searx").await?;
        Ok(hits_from(data.get("results"), "title", "url", "content", max_results))
    }

    fn provider_name(&self) -> &str {
        "searx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hits_from_assigns_positions() {
        let payload = json!({
            "items": [
                {"title": "A", "link": "https://a.example", "snippet": "first"},
                {"title": "B", "link": "https://b.example", "snippet": "second"},
                {"title": "C", "link": "https://c.example", "snippet": "third"}
            ]
        });
        let hits = hits_from(payload.get("items"), "title", "link", "snippet", 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[1].url, "https://b.example");
        assert_eq!(hits[1].position, 1);
    }

    #[test]
    fn test_hits_from_handles_missing_fields() {
        let payload = json!({
            "webPages": {"value": [{"name": "Only title", "url": "https://x.example"}, {"name": "no url"}]}
        });
        let hits = hits_from(payload.pointer("/webPages/value"), "name", "url", "snippet", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].snippet, "");
        assert!(hits_from(None, "title", "link", "snippet", 10).is_empty());
    }
}
