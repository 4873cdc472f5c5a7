//! Research aggregation: query generation, fan-out search, ranking and fact extraction.

use super::{dedup_by_url, rank_by_relevance, truncate_chars, Finding, FindingCache, PageFetcher, ResearchResult};
use crate::config::{Prompts, SearchSettings};
use crate::error::Result;
use crate::llm::{parse_json_response, CompletionRequest, LlmClient};
use crate::search::SearchProvider;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Research aggregator.
pub struct ResearchService {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    cache: FindingCache,
    settings: SearchSettings,
    prompts: Prompts,
}

#[derive(Debug, Deserialize)]
struct ExtractedFacts {
    #[serde(default)]
    key_facts: Vec<String>,
    #[serde(default)]
    structured_summary: String,
    #[serde(default)]
    query_used: Option<String>,
}

impl ResearchService {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        cache: FindingCache,
        settings: SearchSettings,
    ) -> Self {
        Self {
            llm,
            search,
            fetcher,
            cache,
            settings,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Research a topic.
    ///
    /// Individual search or fetch failures and unparsable LLM output are
    /// recovered locally; the returned result always holds every unique finding.
    #[instrument(skip(self))]
    pub async fn research(&self, topic: &str) -> Result<ResearchResult> {
        info!("Researching topic: {}", topic);
        let queries = self.generate_queries(topic).await;
        debug!("Search queries: {:?}", queries);

        // Collect every query's outcome before merging so issue order decides duplicates.
        let outcomes = join_all(queries.iter().map(|q| {
            self.cache
                .get_or_fetch_search(self.search.as_ref(), q, self.settings.max_results)
        }))
        .await;

        let mut merged = Vec::new();
        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(findings) => merged.extend(findings),
                Err(e) => warn!("Search failed for '{}': {}", query, e),
            }
        }

        let mut unique = dedup_by_url(merged);
        info!("{} unique findings from {} queries", unique.len(), queries.len());

        let top: Vec<usize> = rank_by_relevance(&unique)
            .into_iter()
            .take(self.settings.top_pages_to_fetch)
            .collect();
        let enriched = join_all(top.iter().map(|&idx| {
            self.cache
                .get_or_fetch_content(self.fetcher.as_ref(), unique[idx].clone())
        }))
        .await;
        for (idx, finding) in top.into_iter().zip(enriched) {
            unique[idx] = finding;
        }

        Ok(self.extract_facts(topic, unique).await)
    }

    /// Ask the LLM for search queries, falling back to fixed variants of the topic.
    async fn generate_queries(&self, topic: &str) -> Vec<String> {
        let mut vars = HashMap::new();
        vars.insert("topic".to_string(), topic.to_string());
        vars.insert("count".to_string(), self.settings.max_queries.to_string());
        let prompt = self.prompts.render_with_custom(&self.prompts.research.queries, &vars);

        let request = CompletionRequest::new(prompt)
            .with_max_tokens(512)
            .with_temperature(0.3);

        let text = match self.llm.complete(&request).await {
            Ok(response) => response.text,
            Err(e) => {
                warn!("Query generation failed, using fallback queries: {}", e);
                return fallback_queries(topic);
            }
        };

        match parse_json_response::<Value>(&text) {
            Some(Value::Array(items)) => {
                let queries: Vec<String> = items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
                    .filter(|s| !s.is_empty())
                    .take(self.settings.max_queries)
                    .collect();
                if queries.is_empty() {
                    vec![topic.to_string()]
                } else {
                    queries
                }
            }
            Some(_) => vec![topic.to_string()],
            None => {
                warn!("Unparsable query list, using fallback queries");
                fallback_queries(topic)
            }
        }
    }

    /// Condense findings into key facts; never fails.
    async fn extract_facts(&self, topic: &str, findings: Vec<Finding>) -> ResearchResult {
        let sources = findings
            .iter()
            .take(self.settings.max_sources_for_facts)
            .map(|f| {
                format!(
                    "SOURCE: {}\nURL: {}\n{}\n---",
                    f.title,
                    f.url,
                    truncate_chars(f.best_text(), self.settings.content_char_budget)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut vars = HashMap::new();
        vars.insert("topic".to_string(), topic.to_string());
        vars.insert("sources".to_string(), sources);
        let prompt = self.prompts.render_with_custom(&self.prompts.research.facts, &vars);
        let request = CompletionRequest::new(prompt).with_max_tokens(2048).json();

        let extracted = match self.llm.complete(&request).await {
            Ok(response) => parse_json_response::<ExtractedFacts>(&response.text),
            Err(e) => {
                warn!("Fact extraction failed: {}", e);
                None
            }
        };

        let facts = extracted.unwrap_or_else(|| {
            warn!("Using snippets as key facts for '{}'", topic);
            ExtractedFacts {
                key_facts: findings
                    .iter()
                    .take(self.settings.max_sources_for_facts)
                    .map(|f| f.snippet.clone())
                    .collect(),
                structured_summary: format!("Research on: {}", topic),
                query_used: None,
            }
        });

        let relevant_urls = findings
            .iter()
            .filter(|f| f.full_content.is_some())
            .map(|f| f.url.clone())
            .collect();

        ResearchResult {
            topic: topic.to_string(),
            query_used: facts.query_used.unwrap_or_else(|| topic.to_string()),
            findings,
            key_facts: facts.key_facts,
            structured_summary: facts.structured_summary,
            relevant_urls,
        }
    }
}

fn fallback_queries(topic: &str) -> Vec<String> {
    vec![
        topic.to_string(),
        format!("{} announcement", topic),
        format!("{} review", topic),
    ]
}
