//! Prompt templates for Reelsmith.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub research: ResearchPrompts,
    pub script: ScriptPrompts,
    pub metadata: MetadataPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for query generation and fact extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchPrompts {
    pub queries: String,
    pub facts: String,
}

impl Default for ResearchPrompts {
    fn default() -> Self {
        Self {
            queries: r#"Generate {{count}} targeted search queries to research this topic for a YouTube tech video: '{{topic}}'

Return ONLY a JSON array of strings."#
                .to_string(),

            facts: r#"Researching '{{topic}}' for a YouTube tech video.

Sources:
{{sources}}

Return JSON: { "key_facts": [...], "structured_summary": "...", "query_used": "..." }
8-15 specific key_facts. Return ONLY valid JSON."#
                .to_string(),
        }
    }
}

/// Prompts for narration script generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptPrompts {
    pub system: String,
    pub user: String,
}

impl Default for ScriptPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an expert YouTube scriptwriter specialising in tech content.
Write in a {{tone}} style for {{audience}}.
{{style}}. {{opener_hook}}.
Embed visual cues using [SCREENSHOT: https://url] and [VISUAL: description] markers.
Target word count: {{target_words}} words (~{{target_minutes}} minutes at {{words_per_minute}} wpm).
Return ONLY valid JSON, no markdown fences."#
                .to_string(),

            user: r#"Create a YouTube script about: {{topic}}

RESEARCH SUMMARY:
{{summary}}

KEY FACTS:
{{facts}}

RELEVANT URLS TO SCREENSHOT:
{{urls}}

Return JSON:
{
  "title": "engaging video title",
  "sections": [
    {
      "section_id": "intro",
      "section_type": "intro",
      "title": "Section Title",
      "narration_text": "Full narration with [SCREENSHOT: url] markers"
    }
  ]
}

Include {{min_sections}}-{{max_sections}} sections. Types: {{section_types}}."#
                .to_string(),
        }
    }
}

/// Prompt for upload metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataPrompts {
    pub user: String,
}

impl Default for MetadataPrompts {
    fn default() -> Self {
        Self {
            user: r#"Write YouTube upload metadata for a video titled '{{title}}' about {{topic}}.

SUMMARY:
{{summary}}

SECTIONS:
{{sections}}

Return JSON:
{
  "title": "under 100 characters",
  "description": "2-3 paragraphs in {{language}}, ending with the sources",
  "tags": ["up to {{max_tags}} search tags"],
  "thumbnail_suggestions": ["short visual idea", "..."]
}
Return ONLY valid JSON."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let research_path = custom_path.join("research.toml");
            if research_path.exists() {
                let content = std::fs::read_to_string(&research_path)?;
                prompts.research = toml::from_str(&content)?;
            }

            let script_path = custom_path.join("script.toml");
            if script_path.exists() {
                let content = std::fs::read_to_string(&script_path)?;
                prompts.script = toml::from_str(&content)?;
            }

            let metadata_path = custom_path.join("metadata.toml");
            if metadata_path.exists() {
                let content = std::fs::read_to_string(&metadata_path)?;
                prompts.metadata = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.research.queries.contains("{{topic}}"));
        assert!(prompts.script.system.contains("[SCREENSHOT:"));
        assert!(prompts.metadata.user.contains("{{max_tags}}"));
    }

    #[test]
    fn test_custom_metadata_prompt_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("metadata.toml"), "user = \"Tags for {{title}}\"\n").unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.metadata.user, "Tags for {{title}}");
        assert!(prompts.script.user.contains("{{topic}}"));
    }

    #[test]
    fn test_render_keeps_literal_json_braces() {
        let prompts = Prompts::default();
        let mut vars = HashMap::new();
        vars.insert("topic".to_string(), "WebGPU".to_string());
        vars.insert("sources".to_string(), "SOURCE: a".to_string());

        let rendered = Prompts::render(&prompts.research.facts, &vars);
        assert!(rendered.contains("Researching 'WebGPU'"));
        assert!(rendered.contains(r#"{ "key_facts": [...]"#));
    }

    #[test]
    fn test_custom_variables_are_overridden_by_call_vars() {
        let mut custom = HashMap::new();
        custom.insert("channel".to_string(), "Byte Sized".to_string());
        custom.insert("topic".to_string(), "ignored".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = HashMap::new();
        vars.insert("topic".to_string(), "Zig".to_string());
        let out = prompts.render_with_custom("{{channel}} on {{topic}}", &vars);
        assert_eq!(out, "Byte Sized on Zig");
    }
}
