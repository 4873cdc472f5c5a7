//! Persistent, content-addressed cache for search results and page text.
//!
//! Entries live under `<cache_dir>/research/` as `search_<sha256>.json` and
//! `page_<sha256>.txt`. Cached data never expires; `clear` is the only
//! invalidation.

use super::{Finding, PageFetcher};
use crate::error::Result;
use crate::search::SearchProvider;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Counts of cached entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub search_entries: usize,
    pub page_entries: usize,
    pub total_bytes: u64,
}

/// Research cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct FindingCache {
    root: PathBuf,
}

impl FindingCache {
    /// Open (and create) the cache under `cache_dir/research`.
    pub fn new(cache_dir: &Path) -> Result<Self> {
        let root = cache_dir.join("research");
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Key for a search call.
    pub fn search_key(provider: &str, query: &str) -> String {
        hex_digest(&format!("{}:{}", provider, query))
    }

    /// Key for fetched page content.
    pub fn content_key(url: &str) -> String {
        hex_digest(url)
    }

    fn search_path(&self, provider: &str, query: &str) -> PathBuf {
        self.root.join(format!("search_{}.json", Self::search_key(provider, query)))
    }

    fn page_path(&self, url: &str) -> PathBuf {
        self.root.join(format!("page_{}.txt", Self::content_key(url)))
    }

    /// Return cached findings for `query`, or run the search and persist the result.
    #[instrument(skip(self, provider), fields(provider = provider.provider_name()))]
    pub async fn get_or_fetch_search(
        &self,
        provider: &dyn SearchProvider,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Finding>> {
        let path = self.search_path(provider.provider_name(), query);

        if let Ok(content) = tokio::fs::read_to_string(&path).await {
            match serde_json::from_str::<Vec<Finding>>(&content) {
                Ok(findings) => {
                    debug!("Search cache hit ({} findings)", findings.len());
                    return Ok(findings);
                }
                Err(e) => warn!("Ignoring unreadable cache entry {}: {}", path.display(), e),
            }
        }

        let hits = provider.search(query, max_results).await?;
        let findings: Vec<Finding> = hits.into_iter().map(Finding::from_hit).collect();

        let json = serde_json::to_string(&findings)?;
        if let Err(e) = write_atomic(&path, json.as_bytes()).await {
            warn!("Failed to persist search results: {}", e);
        }

        Ok(findings)
    }

    /// Return `finding` with `full_content` set from the cache or a fresh fetch.
    ///
    /// Fetch failures and pages with no readable text are swallowed: the finding
    /// comes back with its snippet only.
    #[instrument(skip(self, fetcher, finding), fields(url = %finding.url))]
    pub async fn get_or_fetch_content(&self, fetcher: &dyn PageFetcher, mut finding: Finding) -> Finding {
        let path = self.page_path(&finding.url);

        if let Ok(text) = tokio::fs::read_to_string(&path).await {
            if !text.trim().is_empty() {
                debug!("Page cache hit");
                finding.full_content = Some(text);
                return finding;
            }
        }

        match fetcher.fetch_text(&finding.url).await {
            Ok(text) if text.trim().is_empty() => {
                warn!("Fetched page {} has no readable text", finding.url);
            }
            Ok(text) => {
                if let Err(e) = write_atomic(&path, text.as_bytes()).await {
                    warn!("Failed to persist page text: {}", e);
                }
                finding.full_content = Some(text);
            }
            Err(e) => warn!("Fetch failed {}: {}", finding.url, e),
        }

        finding
    }

    /// Count cached entries.
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for entry in std::fs::read_dir(&self.root)?.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("search_") && name.ends_with(".json") {
                stats.search_entries += 1;
            } else if name.starts_with("page_") && name.ends_with(".txt") {
                stats.page_entries += 1;
            } else {
                continue;
            }
            stats.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
        Ok(stats)
    }

    /// Delete every cached entry, returning how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)?.flatten() {
            if entry.path().is_file() {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn hex_digest(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Write to a sibling temp file and rename it into place.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReelsmithError;
    use crate::search::SearchHit;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSearch {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for CountingSearch {
        async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchHit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SearchHit {
                title: format!("About {}", query),
                url: format!("https://{}.example", query.replace(' ', "-")),
                snippet: "snippet".into(),
                position: 0,
            }])
        }

        fn provider_name(&self) -> &str {
            "counting"
        }
    }

    struct FlakyFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PageFetcher for FlakyFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ReelsmithError::Fetch(format!("{} returned 503", url)))
            } else {
                Ok(format!("page text of {}", url))
            }
        }
    }

    #[test]
    fn test_keys_are_stable_and_distinct() {
        let a = FindingCache::search_key("google", "rust");
        assert_eq!(a, FindingCache::search_key("google", "rust"));
        assert_ne!(a, FindingCache::search_key("bing", "rust"));
        assert_eq!(a.len(), 64);
        assert_eq!(
            FindingCache::content_key("https://a.example/1"),
            FindingCache::content_key("https://a.example/1")
        );
    }

    #[tokio::test]
    async fn test_search_hit_skips_provider() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FindingCache::new(dir.path()).unwrap();
        let provider = CountingSearch { calls: AtomicUsize::new(0) };

        let first = cache.get_or_fetch_search(&provider, "rust async", 5).await.unwrap();
        let second = cache.get_or_fetch_search(&provider, "rust async", 5).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(cache.stats().unwrap().search_entries, 1);
    }

    #[tokio::test]
    async fn test_content_fetch_failure_keeps_snippet() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FindingCache::new(dir.path()).unwrap();
        let fetcher = FlakyFetcher { calls: AtomicUsize::new(0), fail: true };
        let finding = Finding {
            title: "t".into(),
            url: "https://down.example".into(),
            snippet: "only the snippet".into(),
            full_content: None,
            relevance_score: 1.0,
        };

        let result = cache.get_or_fetch_content(&fetcher, finding.clone()).await;
        assert_eq!(result, finding);
        assert_eq!(cache.stats().unwrap().page_entries, 0);
    }

    struct ScriptOnlyFetcher;

    #[async_trait]
    impl PageFetcher for ScriptOnlyFetcher {
        async fn fetch_text(&self, _url: &str) -> Result<String> {
            Ok(crate::research::html_to_text(
                "<html><body><script>app()</script></body></html>",
            ))
        }
    }

    #[tokio::test]
    async fn test_page_without_text_is_not_content() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FindingCache::new(dir.path()).unwrap();
        let finding = Finding {
            title: "t".into(),
            url: "https://spa.example".into(),
            snippet: "the snippet".into(),
            full_content: None,
            relevance_score: 1.0,
        };

        let result = cache.get_or_fetch_content(&ScriptOnlyFetcher, finding.clone()).await;
        assert_eq!(result.full_content, None);
        assert_eq!(cache.stats().unwrap().page_entries, 0);

        // A blank entry left on disk is ignored rather than served
        std::fs::write(cache.page_path(&finding.url), "  \n").unwrap();
        let again = cache.get_or_fetch_content(&ScriptOnlyFetcher, finding).await;
        assert_eq!(again.full_content, None);
    }

    #[tokio::test]
    async fn test_content_is_cached_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FlakyFetcher { calls: AtomicUsize::new(0), fail: false };
        let finding = Finding {
            title: "t".into(),
            url: "https://up.example".into(),
            snippet: "s".into(),
            full_content: None,
            relevance_score: 1.0,
        };

        let first = FindingCache::new(dir.path()).unwrap();
        let enriched = first.get_or_fetch_content(&fetcher, finding.clone()).await;
        assert_eq!(enriched.full_content.as_deref(), Some("page text of https://up.example"));

        let second = FindingCache::new(dir.path()).unwrap();
        let again = second.get_or_fetch_content(&fetcher, finding).await;
        assert_eq!(again.full_content, enriched.full_content);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        assert_eq!(second.clear().unwrap(), 1);
        assert_eq!(second.stats().unwrap(), CacheStats::default());
    }
}
