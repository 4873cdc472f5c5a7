//! Topic research: concurrent web search, caching, deduplication and fact extraction.
//!
//! A research run fans out several search queries, merges their results into a
//! unique set of [`Finding`]s, enriches the best-ranked ones with page text and
//! asks the LLM to condense everything into key facts.

mod cache;
mod fetch;
mod service;

pub use cache::{CacheStats, FindingCache};
pub use fetch::{html_to_text, HttpPageFetcher, PageFetcher};
pub use service::ResearchService;

use crate::search::SearchHit;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single search-derived record, optionally enriched with page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    pub relevance_score: f64,
}

impl Finding {
    /// Build a finding from a provider hit. Rank 0 scores 1.0, each later rank 0.1 less.
    pub fn from_hit(hit: SearchHit) -> Self {
        Self {
            relevance_score: 1.0 - hit.position as f64 * 0.1,
            title: hit.title,
            url: hit.url,
            snippet: hit.snippet,
            full_content: None,
        }
    }

    /// Page text if fetched, otherwise the snippet.
    pub fn best_text(&self) -> &str {
        self.full_content
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(&self.snippet)
    }
}

/// Outcome of researching a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub topic: String,
    pub query_used: String,
    /// Unique findings in merge order.
    pub findings: Vec<Finding>,
    pub key_facts: Vec<String>,
    pub structured_summary: String,
    /// Urls whose page content was fetched.
    pub relevant_urls: Vec<String>,
}

/// Keep only the first finding seen for each url, preserving order.
pub fn dedup_by_url(findings: Vec<Finding>) -> Vec<Finding> {
    let mut seen = HashSet::new();
    findings
        .into_iter()
        .filter(|f| seen.insert(f.url.clone()))
        .collect()
}

/// Indices of `findings` ordered by relevance, highest first; ties keep their original order.
pub fn rank_by_relevance(findings: &[Finding]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..findings.len()).collect();
    order.sort_by(|&a, &b| {
        findings[b]
            .relevance_score
            .total_cmp(&findings[a].relevance_score)
    });
    order
}

/// Truncate to at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(url: &str, snippet: &str, score: f64) -> Finding {
        Finding {
            title: url.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
            full_content: None,
            relevance_score: score,
        }
    }

    #[test]
    fn test_dedup_keeps_first_seen() {
        let merged = vec![
            finding("https://a.example", "from query 1", 1.0),
            finding("https://b.example", "from query 1", 0.9),
            finding("https://a.example", "from query 3", 0.7),
            finding("https://c.example", "from query 3", 0.6),
            finding("https://b.example", "from query 4", 1.0),
        ];

        let unique = dedup_by_url(merged);
        let urls: Vec<&str> = unique.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example", "https://b.example", "https://c.example"]);
        assert_eq!(unique[0].snippet, "from query 1");
        assert_eq!(unique[1].relevance_score, 0.9);
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let findings = vec![
            finding("a", "", 0.9),
            finding("b", "", 1.0),
            finding("c", "", 0.9),
            finding("d", "", 1.0),
        ];
        assert_eq!(rank_by_relevance(&findings), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_from_hit_scores_by_position() {
        let hit = SearchHit {
            title: "t".into(),
            url: "https://x.example".into(),
            snippet: "s".into(),
            position: 3,
        };
        let f = Finding::from_hit(hit);
        assert!((f.relevance_score - 0.7).abs() < 1e-9);
        assert_eq!(f.best_text(), "s");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
