//! Upload metadata for a finished video.
//!
//! The LLM proposes a title, description, tags and thumbnail ideas. Metadata is
//! never allowed to fail a run: a missing or unparsable reply falls back to the
//! script title and the research summary.

use crate::config::{MetadataSettings, Prompts};
use crate::llm::{parse_json_response, CompletionRequest, LlmClient};
use crate::research::ResearchResult;
use crate::script::VideoScript;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_SOURCES: usize = 5;

/// Title, description and tags for publishing a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
    pub language: String,
    pub thumbnail_suggestions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetadataPayload {
    title: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    thumbnail_suggestions: Vec<String>,
}

/// Writes upload metadata with the LLM.
pub struct MetadataGenerator {
    llm: Arc<dyn LlmClient>,
    settings: MetadataSettings,
    prompts: Prompts,
}

impl MetadataGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, settings: MetadataSettings) -> Self {
        Self {
            llm,
            settings,
            prompts: Prompts::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Metadata for `script`. Never fails.
    #[instrument(skip(self, script, research), fields(title = %script.title))]
    pub async fn generate(&self, script: &VideoScript, research: &ResearchResult) -> VideoMetadata {
        let sections = script
            .sections
            .iter()
            .map(|s| format!("- {}", if s.title.is_empty() { &s.section_id } else { &s.title }))
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("title".to_string(), script.title.clone());
        vars.insert("topic".to_string(), research.topic.clone());
        vars.insert("summary".to_string(), research.structured_summary.clone());
        vars.insert("sections".to_string(), sections);
        vars.insert("language".to_string(), self.settings.language.clone());
        vars.insert("max_tags".to_string(), self.settings.max_tags.to_string());
        let prompt = self.prompts.render_with_custom(&self.prompts.metadata.user, &vars);

        let request = CompletionRequest::new(prompt).with_max_tokens(2048).json();
        let payload = match self.llm.complete(&request).await {
            Ok(response) => parse_json_response::<MetadataPayload>(&response.text).unwrap_or_else(|| {
                warn!("Unparsable metadata from {}, using script fallback", response.provider);
                MetadataPayload::default()
            }),
            Err(e) => {
                warn!("Metadata generation failed, using script fallback: {}", e);
                MetadataPayload::default()
            }
        };

        let metadata = self.assemble(payload, script, research);
        info!("Metadata '{}' with {} tags", metadata.title, metadata.tags.len());
        metadata
    }

    fn assemble(&self, payload: MetadataPayload, script: &VideoScript, research: &ResearchResult) -> VideoMetadata {
        let title = payload
            .title
            .map(|t| t.trim().chars().take(MAX_TITLE_CHARS).collect::<String>())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| script.title.clone());

        let description = payload
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| fallback_description(research));

        let mut generated = payload.tags;
        if generated.is_empty() {
            generated.push(research.topic.clone());
        }
        let tags = merge_tags(&self.settings.default_tags, &generated, self.settings.max_tags);

        VideoMetadata {
            title,
            description,
            tags,
            category: self.settings.category.clone(),
            language: self.settings.language.clone(),
            thumbnail_suggestions: payload
                .thumbnail_suggestions
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

fn fallback_description(research: &ResearchResult) -> String {
    let mut description = research.structured_summary.clone();
    let sources: Vec<&str> = research
        .findings
        .iter()
        .take(MAX_DESCRIPTION_SOURCES)
        .map(|f| f.url.as_str())
        .collect();
    if !sources.is_empty() {
        description.push_str("\n\nSources:\n");
        description.push_str(&sources.join("\n"));
    }
    description
}

/// Defaults first, then generated tags; `#` prefixes stripped, case-insensitive
/// duplicates dropped, at most `max` kept.
pub fn merge_tags(defaults: &[String], generated: &[String], max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    defaults
        .iter()
        .chain(generated)
        .map(|tag| tag.trim().trim_start_matches('#').trim().to_string())
        .filter(|tag| !tag.is_empty() && seen.insert(tag.to_lowercase()))
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedLlm;
    use crate::research::Finding;
    use crate::script::{build_script, RawSection};

    fn research() -> ResearchResult {
        ResearchResult {
            topic: "WebGPU".to_string(),
            query_used: "WebGPU".to_string(),
            findings: vec![Finding {
                title: "Launch".to_string(),
                url: "https://gpu.example/launch".to_string(),
                snippet: "s".to_string(),
                full_content: None,
                relevance_score: 1.0,
            }],
            key_facts: vec!["Ships in Chrome 113".to_string()],
            structured_summary: "A new GPU API for the web".to_string(),
            relevant_urls: Vec::new(),
        }
    }

    fn script() -> VideoScript {
        build_script(
            "WebGPU",
            Some("WebGPU Explained"),
            vec![RawSection {
                section_id: Some("intro".to_string()),
                title: Some("Why now".to_string()),
                narration_text: "Graphics changed".to_string(),
                ..RawSection::default()
            }],
            150,
        )
        .unwrap()
    }

    fn settings() -> MetadataSettings {
        MetadataSettings {
            default_tags: vec!["tech".to_string(), "explainer".to_string()],
            max_tags: 4,
            ..MetadataSettings::default()
        }
    }

    #[tokio::test]
    async fn test_generated_metadata_merges_default_tags() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(r##"```json
{"title": "  WebGPU in 8 Minutes ", "description": "All about it.",
 "tags": ["#WebGPU", "Tech", "graphics", "gpu", "browsers"],
 "thumbnail_suggestions": ["GPU chip on fire", " "]}
```"##)]));
        let generator = MetadataGenerator::new(llm.clone(), settings());

        let metadata = generator.generate(&script(), &research()).await;
        assert_eq!(metadata.title, "WebGPU in 8 Minutes");
        assert_eq!(metadata.description, "All about it.");
        assert_eq!(metadata.tags, vec!["tech", "explainer", "WebGPU", "graphics"]);
        assert_eq!(metadata.category, "Science & Technology");
        assert_eq!(metadata.thumbnail_suggestions, vec!["GPU chip on fire"]);

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].json_mode);
        assert!(prompts[0].user_prompt.contains("'WebGPU Explained'"));
        assert!(prompts[0].user_prompt.contains("- Why now"));
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_script() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err("rate limited")]));
        let metadata = MetadataGenerator::new(llm, settings()).generate(&script(), &research()).await;

        assert_eq!(metadata.title, "WebGPU Explained");
        assert_eq!(
            metadata.description,
            "A new GPU API for the web\n\nSources:\nhttps://gpu.example/launch"
        );
        assert_eq!(metadata.tags, vec!["tech", "explainer", "WebGPU"]);
        assert!(metadata.thumbnail_suggestions.is_empty());
        assert_eq!(metadata.language, "en");
    }

    #[tokio::test]
    async fn test_unparsable_reply_falls_back_to_script() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok("Here are some ideas for your video!")]));
        let metadata = MetadataGenerator::new(llm, MetadataSettings::default())
            .generate(&script(), &research())
            .await;
        assert_eq!(metadata.title, "WebGPU Explained");
        assert_eq!(metadata.tags, vec!["WebGPU"]);
    }

    #[test]
    fn test_merge_tags_caps_and_dedups() {
        let defaults = vec!["Rust".to_string(), " ".to_string()];
        let generated = vec!["rust".to_string(), "#async".to_string(), "tokio".to_string()];
        assert_eq!(merge_tags(&defaults, &generated, 2), vec!["Rust", "async"]);
        assert!(merge_tags(&defaults, &generated, 0).is_empty());
    }
}
