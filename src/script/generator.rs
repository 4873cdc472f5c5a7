//! LLM-backed script writing.

use super::{build_script, RawSection, VideoScript};
use crate::config::{Prompts, ScriptSettings};
use crate::error::{ReelsmithError, Result};
use crate::llm::{parse_json_response, CompletionRequest, LlmClient};
use crate::research::ResearchResult;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

const MAX_PROMPT_URLS: usize = 10;

#[derive(Debug, Deserialize)]
struct ScriptPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    sections: Vec<RawSection>,
}

/// Writes a narration script from research results.
pub struct ScriptGenerator {
    llm: Arc<dyn LlmClient>,
    settings: ScriptSettings,
    temperature: f32,
    prompts: Prompts,
}

impl ScriptGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, settings: ScriptSettings) -> Self {
        Self {
            llm,
            settings,
            temperature: 0.7,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Generate and time a script for `research`.
    #[instrument(skip(self, research), fields(topic = %research.topic))]
    pub async fn generate(&self, research: &ResearchResult) -> Result<VideoScript> {
        let persona = self.settings.active_persona()?;
        let target_words = self.settings.target_minutes * self.settings.words_per_minute;

        let mut system_vars = HashMap::new();
        system_vars.insert("tone".to_string(), persona.tone.clone());
        system_vars.insert("audience".to_string(), persona.audience.clone());
        system_vars.insert("style".to_string(), persona.style.clone());
        system_vars.insert("opener_hook".to_string(), persona.opener_hook.clone());
        system_vars.insert("target_words".to_string(), target_words.to_string());
        system_vars.insert("target_minutes".to_string(), self.settings.target_minutes.to_string());
        system_vars.insert("words_per_minute".to_string(), self.settings.words_per_minute.to_string());
        let system = self.prompts.render_with_custom(&self.prompts.script.system, &system_vars);

        let facts = research
            .key_facts
            .iter()
            .map(|f| format!("• {}", f))
            .collect::<Vec<_>>()
            .join("\n");
        let urls = research
            .relevant_urls
            .iter()
            .take(MAX_PROMPT_URLS)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");

        let mut user_vars = HashMap::new();
        user_vars.insert("topic".to_string(), research.topic.clone());
        user_vars.insert("summary".to_string(), research.structured_summary.clone());
        user_vars.insert("facts".to_string(), facts);
        user_vars.insert("urls".to_string(), urls);
        user_vars.insert("min_sections".to_string(), self.settings.sections.min.to_string());
        user_vars.insert("max_sections".to_string(), self.settings.sections.max.to_string());
        user_vars.insert(
            "section_types".to_string(),
            self.settings.sections.allowed_types.join(", "),
        );
        let user = self.prompts.render_with_custom(&self.prompts.script.user, &user_vars);

        let request = CompletionRequest::new(user)
            .with_system(system)
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.temperature)
            .json();
        let response = self.llm.complete(&request).await?;

        let payload: ScriptPayload = parse_json_response(&response.text).ok_or_else(|| {
            ReelsmithError::Script(format!(
                "Unparsable script from {}: {}",
                response.provider,
                response.text.chars().take(200).collect::<String>()
            ))
        })?;
        if payload.sections.is_empty() {
            return Err(ReelsmithError::Script("Script has no sections".to_string()));
        }

        let script = build_script(
            &research.topic,
            payload.title.as_deref(),
            payload.sections,
            self.settings.words_per_minute,
        )?;

        info!(
            "Script '{}': {} sections, ~{:.1} min",
            script.title,
            script.sections.len(),
            script.total_estimated_seconds / 60.0
        );
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedLlm;

    fn research() -> ResearchResult {
        ResearchResult {
            topic: "WebGPU".to_string(),
            query_used: "WebGPU".to_string(),
            findings: Vec::new(),
            key_facts: vec!["Ships in Chrome 113".to_string(), "Replaces WebGL".to_string()],
            structured_summary: "A new GPU API for the web".to_string(),
            relevant_urls: (0..12).map(|i| format!("https://u{}.example", i)).collect(),
        }
    }

    #[tokio::test]
    async fn test_generate_parses_fenced_json() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(r#"```json
{
  "title": "WebGPU in 8 minutes",
  "sections": [
    {"section_id": "intro", "section_type": "intro", "title": "Hook",
     "narration_text": "Graphics on the web just changed [SCREENSHOT: https://u0.example]"},
    {"section_id": "deep", "title": "Details",
     "narration_text": "Compute shaders [VISUAL: pipeline diagram] everywhere"}
  ]
}
```"#)]));
        let generator = ScriptGenerator::new(llm.clone(), ScriptSettings::default());

        let script = generator.generate(&research()).await.unwrap();
        assert_eq!(script.title, "WebGPU in 8 minutes");
        assert_eq!(script.sections.len(), 2);
        assert_eq!(script.sections[1].section_type, "main");
        assert_eq!(script.marker_count(), 2);

        let prompts = llm.prompts.lock().unwrap();
        let request = &prompts[0];
        assert!(request.json_mode);
        assert!(request.user_prompt.contains("• Ships in Chrome 113"));
        assert!(request.user_prompt.contains("https://u9.example"));
        assert!(!request.user_prompt.contains("https://u10.example"));
        assert!(request.system_prompt.as_deref().unwrap().contains("1200 words"));
    }

    #[tokio::test]
    async fn test_unparsable_script_is_an_error() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok("Sorry, I can't write that.")]));
        let generator = ScriptGenerator::new(llm, ScriptSettings::default());
        let err = generator.generate(&research()).await.unwrap_err();
        assert!(matches!(err, ReelsmithError::Script(_)));
    }

    #[tokio::test]
    async fn test_script_without_sections_is_an_error() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(r#"{"title": "Empty", "sections": []}"#)]));
        let generator = ScriptGenerator::new(llm, ScriptSettings::default());
        assert!(generator.generate(&research()).await.is_err());
    }
}
