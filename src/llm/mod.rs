//! LLM completion providers.
//!
//! Every provider family is a closed set of variants selected by
//! [`LlmProviderKind`](crate::config::LlmProviderKind). Callers go through
//! [`LlmClient`] and never touch a vendor SDK directly.

mod claude;
mod gemini;
mod openai;

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiChatClient;

use crate::config::{LlmProviderKind, LlmSettings};
use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub user_prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider for a JSON object where it supports that natively.
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            system_prompt: None,
            max_tokens: 4096,
            temperature: 0.7,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Normalized completion response.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Trait for LLM completion backends.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a prompt and return the completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse>;

    /// Provider name as used in configuration.
    fn provider_name(&self) -> &str;

    /// Model identifier.
    fn model(&self) -> &str;
}

/// Create the configured LLM client.
pub fn create_llm(settings: &LlmSettings) -> Result<Arc<dyn LlmClient>> {
    let model = settings.active_model();
    let timeout = Duration::from_secs(settings.timeout_secs);
    let client: Arc<dyn LlmClient> = match settings.provider {
        LlmProviderKind::Claude => Arc::new(ClaudeClient::from_env(model, timeout)?),
        LlmProviderKind::Openai => Arc::new(OpenAiChatClient::from_env(model, timeout)?),
        LlmProviderKind::Gemini => Arc::new(GeminiClient::from_env(model, timeout)?),
    };
    Ok(client)
}

static CODE_FENCE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^```(?:json)?\s*|\s*```$").expect("Invalid regex")
});

/// Strip a surrounding markdown code fence from model output.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text.trim(), "").to_string()
}

/// Parse model output as JSON, tolerating code fences and surrounding prose.
///
/// Returns `None` when nothing parseable is found; callers fall back to a
/// deterministic default instead of failing.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Option<T> {
    let stripped = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str(&stripped) {
        return Some(value);
    }

    // Models sometimes wrap the payload in prose; try the outermost object or array.
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (stripped.find(open), stripped.rfind(close)) {
            if end > start {
                if let Ok(value) = serde_json::from_str(&stripped[start..=end]) {
                    return Some(value);
                }
            }
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted LLM used by unit tests across the crate.

    use super::*;
    use crate::error::ReelsmithError;
    use std::sync::Mutex;

    /// Returns queued responses in order; an `Err` entry simulates a transport failure.
    pub struct ScriptedLlm {
        responses: Mutex<Vec<std::result::Result<String, String>>>,
        pub prompts: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        pub fn new(responses: Vec<std::result::Result<&str, &str>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse> {
            self.prompts.lock().unwrap().push(request.clone());
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err("no scripted response left".to_string()));
            match next {
                Ok(text) => Ok(LlmResponse {
                    text,
                    provider: "scripted".to_string(),
                    model: "test".to_string(),
                    input_tokens: 0,
                    output_tokens: 0,
                }),
                Err(e) => Err(ReelsmithError::Llm(e)),
            }
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn test_parse_json_response_with_prose() {
        let response = "Here are the queries:\n[\"rust async\", \"tokio runtime\"]\nGood luck!";
        let parsed: Vec<String> = parse_json_response(response).unwrap();
        assert_eq!(parsed, vec!["rust async", "tokio runtime"]);
    }

    #[test]
    fn test_parse_json_response_garbage() {
        assert!(parse_json_response::<Vec<String>>("I cannot help with that.").is_none());
    }

    #[test]
    fn test_request_builder() {
        let req = CompletionRequest::new("hi")
            .with_system("sys")
            .with_max_tokens(512)
            .with_temperature(0.2)
            .json();
        assert_eq!(req.system_prompt.as_deref(), Some("sys"));
        assert_eq!(req.max_tokens, 512);
        assert!(req.json_mode);
    }
}
