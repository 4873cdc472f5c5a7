//! Error types for Reelsmith.

use thiserror::Error;

/// Library-level error type for Reelsmith operations.
#[derive(Error, Debug)]
pub enum ReelsmithError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown {family} provider '{name}'. Available: {available}")]
    UnknownProvider {
        family: &'static str,
        name: String,
        available: String,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Content fetch failed: {0}")]
    Fetch(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Voice synthesis failed: {0}")]
    Voice(String),

    #[error("Visual collection failed: {0}")]
    Visual(String),

    #[error("Video assembly failed: {0}")]
    Assembly(String),

    #[error("Synchronization error: {0}")]
    Sync(String),

    #[error("Quality check failed: {0}")]
    Quality(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Reelsmith operations.
pub type Result<T> = std::result::Result<T, ReelsmithError>;
