//! Configuration module for Reelsmith.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{MetadataPrompts, Prompts, ResearchPrompts, ScriptPrompts};
pub use settings::{
    env_key, parse_override, AzureVoice, BackgroundMusic, ElevenLabsVoice, GeneralSettings, LlmModels,
    LlmProviderKind, LlmSettings, MetadataSettings, OpenAiTtsVoice, Persona, PromptSettings,
    QualityCheckSettings, ScriptSettings, SearchProviderKind, SearchSettings, SectionBounds, Settings,
    TopicFile, TransitionSettings, VideoSettings, VideoStyle, VisualSettings, VoiceProviderKind,
    VoiceSettings,
};
