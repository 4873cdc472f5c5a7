//! Web search providers.
//!
//! Switch backends with `search.provider` in the config
//! (google, bing, serpapi, searx).

mod providers;

pub use providers::{BingSearch, GoogleSearch, SearxSearch, SerpApiSearch};

use crate::config::{SearchProviderKind, SearchSettings};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A raw search result as returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Provider rank, 0-based.
    pub position: usize,
}

/// Trait for search backends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a query and return up to `max_results` ranked hits.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;

    /// Provider name, part of the research cache key.
    fn provider_name(&self) -> &str;
}

/// Create the configured search provider sharing the given HTTP client.
pub fn create_search_provider(
    settings: &SearchSettings,
    http: reqwest::Client,
) -> Result<Arc<dyn SearchProvider>> {
    let provider: Arc<dyn SearchProvider> = match settings.provider {
        SearchProviderKind::Google => Arc::new(GoogleSearch::from_env(http)?),
        SearchProviderKind::Bing => Arc::new(BingSearch::from_env(http)?),
        SearchProviderKind::Serpapi => Arc::new(SerpApiSearch::from_env(http)?),
        SearchProviderKind::Searx => Arc::new(SearxSearch::new(http, &settings.searx_base_url)),
    };
    Ok(provider)
}
