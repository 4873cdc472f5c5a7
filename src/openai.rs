//! OpenAI client configuration shared by the chat and TTS adapters.

use crate::error::{ReelsmithError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create an OpenAI client with the given timeout.
///
/// The key is read from the first environment variable in `key_vars` that is set.
pub fn create_client(key_vars: &[&str], timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let api_key = key_vars
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .ok_or_else(|| {
            ReelsmithError::Config(format!("Missing API key: set {}", key_vars.join(" or ")))
        })?;

    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    Ok(Client::with_config(OpenAIConfig::new().with_api_key(api_key)).with_http_client(http_client))
}
