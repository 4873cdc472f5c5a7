//! Configuration settings for Reelsmith.

use crate::error::{ReelsmithError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub search: SearchSettings,
    pub script: ScriptSettings,
    pub voice: VoiceSettings,
    pub visuals: VisualSettings,
    pub video: VideoSettings,
    pub metadata: MetadataSettings,
    pub quality_checks: QualityCheckSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory where finished videos and scripts are written.
    pub output_dir: String,
    /// Directory for the persistent research cache.
    pub cache_dir: String,
    /// Directory for intermediate audio and image files.
    pub temp_dir: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            output_dir: "./output".to_string(),
            cache_dir: "~/.cache/reelsmith".to_string(),
            temp_dir: "/tmp/reelsmith".to_string(),
        }
    }
}

/// LLM provider family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    Claude,
    Openai,
    Gemini,
}

impl LlmProviderKind {
    pub const ALL: [&'static str; 3] = ["claude", "openai", "gemini"];
}

impl std::str::FromStr for LlmProviderKind {
    type Err = ReelsmithError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(LlmProviderKind::Claude),
            "openai" => Ok(LlmProviderKind::Openai),
            "gemini" => Ok(LlmProviderKind::Gemini),
            _ => Err(ReelsmithError::UnknownProvider {
                family: "LLM",
                name: s.to_string(),
                available: Self::ALL.join(", "),
            }),
        }
    }
}

impl std::fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProviderKind::Claude => write!(f, "claude"),
            LlmProviderKind::Openai => write!(f, "openai"),
            LlmProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

/// Model names per LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmModels {
    pub claude: String,
    pub openai: String,
    pub gemini: String,
}

impl Default for LlmModels {
    fn default() -> Self {
        Self {
            claude: "claude-sonnet-4-20250514".to_string(),
            openai: "gpt-4o".to_string(),
            gemini: "gemini-1.5-pro".to_string(),
        }
    }
}

/// LLM completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Active provider (claude, openai, gemini).
    pub provider: LlmProviderKind,
    /// Model used for each provider.
    pub models: LlmModels,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::Claude,
            models: LlmModels::default(),
            temperature: 0.7,
            timeout_secs: 300,
        }
    }
}

impl LlmSettings {
    /// Model configured for the active provider.
    pub fn active_model(&self) -> &str {
        match self.provider {
            LlmProviderKind::Claude => &self.models.claude,
            LlmProviderKind::Openai => &self.models.openai,
            LlmProviderKind::Gemini => &self.models.gemini,
        }
    }
}

/// Web search backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    #[default]
    Google,
    Bing,
    Serpapi,
    Searx,
}

impl SearchProviderKind {
    pub const ALL: [&'static str; 4] = ["google", "bing", "serpapi", "searx"];
}

impl std::str::FromStr for SearchProviderKind {
    type Err = ReelsmithError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(SearchProviderKind::Google),
            "bing" => Ok(SearchProviderKind::Bing),
            "serpapi" => Ok(SearchProviderKind::Serpapi),
            "searx" | "searxng" => Ok(SearchProviderKind::Searx),
            _ => Err(ReelsmithError::UnknownProvider {
                family: "search",
                name: s.to_string(),
                available: Self::ALL.join(", "),
            }),
        }
    }
}

impl std::fmt::Display for SearchProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchProviderKind::Google => write!(f, "google"),
            SearchProviderKind::Bing => write!(f, "bing"),
            SearchProviderKind::Serpapi => write!(f, "serpapi"),
            SearchProviderKind::Searx => write!(f, "searx"),
        }
    }
}

/// Research and web search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Search backend (google, bing, serpapi, searx).
    pub provider: SearchProviderKind,
    /// Results requested per query.
    pub max_results: usize,
    /// Number of highest-ranked findings whose pages are fetched.
    pub top_pages_to_fetch: usize,
    /// Overall timeout for each search or page fetch, in seconds.
    pub timeout_secs: u64,
    /// Characters of each source passed to fact extraction.
    pub content_char_budget: usize,
    /// Number of sources passed to fact extraction.
    pub max_sources_for_facts: usize,
    /// Maximum characters kept from a fetched page.
    pub max_page_chars: usize,
    /// Maximum number of generated search queries.
    pub max_queries: usize,
    /// User agent sent with search and page requests.
    pub user_agent: String,
    /// Base URL for a self-hosted Searx instance.
    pub searx_base_url: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::Google,
            max_results: 10,
            top_pages_to_fetch: 5,
            timeout_secs: 30,
            content_char_budget: 1500,
            max_sources_for_facts: 8,
            max_page_chars: 8000,
            max_queries: 4,
            user_agent: "Mozilla/5.0 (compatible; ResearchBot/1.0)".to_string(),
            searx_base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Narrator persona used when writing scripts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Persona {
    pub tone: String,
    pub audience: String,
    pub style: String,
    pub opener_hook: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            tone: "energetic but informed".to_string(),
            audience: "developers and tech enthusiasts".to_string(),
            style: "Explain concrete details, avoid hype".to_string(),
            opener_hook: "Open with the single most surprising fact".to_string(),
        }
    }
}

/// Section count and type constraints for generated scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionBounds {
    pub min: usize,
    pub max: usize,
    pub allowed_types: Vec<String>,
}

impl Default for SectionBounds {
    fn default() -> Self {
        Self {
            min: 4,
            max: 8,
            allowed_types: ["intro", "main", "demo", "comparison", "outro"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Script generation and timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// Spoken rate used to estimate section durations.
    pub words_per_minute: u32,
    /// Target video length in minutes.
    pub target_minutes: u32,
    /// Name of the active persona.
    pub persona: String,
    /// Available personas by name.
    pub personas: HashMap<String, Persona>,
    pub sections: SectionBounds,
    /// Token limit for the script completion.
    pub max_tokens: u32,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        let mut personas = HashMap::new();
        personas.insert("tech_explainer".to_string(), Persona::default());
        Self {
            words_per_minute: 150,
            target_minutes: 8,
            persona: "tech_explainer".to_string(),
            personas,
            sections: SectionBounds::default(),
            max_tokens: 8192,
        }
    }
}

impl ScriptSettings {
    /// The active persona.
    pub fn active_persona(&self) -> Result<&Persona> {
        self.personas.get(&self.persona).ok_or_else(|| {
            ReelsmithError::Config(format!("Unknown persona '{}'", self.persona))
        })
    }
}

/// Text-to-speech backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoiceProviderKind {
    #[default]
    Elevenlabs,
    OpenaiTts,
    Azure,
}

impl VoiceProviderKind {
    pub const ALL: [&'static str; 3] = ["elevenlabs", "openai_tts", "azure"];
}

impl std::str::FromStr for VoiceProviderKind {
    type Err = ReelsmithError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elevenlabs" => Ok(VoiceProviderKind::Elevenlabs),
            "openai_tts" | "openai" => Ok(VoiceProviderKind::OpenaiTts),
            "azure" => Ok(VoiceProviderKind::Azure),
            _ => Err(ReelsmithError::UnknownProvider {
                family: "voice",
                name: s.to_string(),
                available: Self::ALL.join(", "),
            }),
        }
    }
}

impl std::fmt::Display for VoiceProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceProviderKind::Elevenlabs => write!(f, "elevenlabs"),
            VoiceProviderKind::OpenaiTts => write!(f, "openai_tts"),
            VoiceProviderKind::Azure => write!(f, "azure"),
        }
    }
}

/// ElevenLabs voice parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevenLabsVoice {
    pub model: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for ElevenLabsVoice {
    fn default() -> Self {
        Self {
            model: "eleven_multilingual_v2".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

/// OpenAI TTS voice parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiTtsVoice {
    pub model: String,
    pub voice_name: String,
    pub speed: f32,
}

impl Default for OpenAiTtsVoice {
    fn default() -> Self {
        Self {
            model: "tts-1-hd".to_string(),
            voice_name: "onyx".to_string(),
            speed: 1.0,
        }
    }
}

/// Azure Cognitive Services TTS parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureVoice {
    pub voice_name: String,
    pub rate: String,
    pub pitch: String,
    pub region: String,
}

impl Default for AzureVoice {
    fn default() -> Self {
        Self {
            voice_name: "en-US-GuyNeural".to_string(),
            rate: "+0%".to_string(),
            pitch: "+0Hz".to_string(),
            region: "eastus".to_string(),
        }
    }
}

/// Voice synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Active provider (elevenlabs, openai_tts, azure).
    pub provider: VoiceProviderKind,
    pub elevenlabs: ElevenLabsVoice,
    pub openai_tts: OpenAiTtsVoice,
    pub azure: AzureVoice,
    /// Sections synthesised concurrently.
    pub max_concurrent: usize,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            provider: VoiceProviderKind::Elevenlabs,
            elevenlabs: ElevenLabsVoice::default(),
            openai_tts: OpenAiTtsVoice::default(),
            azure: AzureVoice::default(),
            max_concurrent: 2,
        }
    }
}

/// Visual collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    /// Headless browser binary used for screenshots.
    pub browser: String,
    /// Per-capture timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            browser: "chromium".to_string(),
            timeout_secs: 45,
        }
    }
}

/// Canvas and title-card look of a video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoStyle {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Canvas color behind letterboxed assets and title cards.
    pub background_color: String,
    pub text_color: String,
    pub font_size: u32,
}

impl Default for VideoStyle {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            background_color: "0x101018".to_string(),
            text_color: "white".to_string(),
            font_size: 56,
        }
    }
}

/// Transition between consecutive slides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransitionSettings {
    /// An ffmpeg `xfade` transition name, or "none" for hard cuts.
    #[serde(rename = "type")]
    pub kind: String,
    /// Seconds each transition lasts.
    pub duration: f64,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            kind: "fade".to_string(),
            duration: 0.5,
        }
    }
}

impl TransitionSettings {
    pub fn is_enabled(&self) -> bool {
        self.kind != "none" && self.duration > 0.0
    }
}

/// Looped music mixed under the narration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackgroundMusic {
    pub enabled: bool,
    pub path: String,
    /// Gain applied to the music, 0.0 to 1.0.
    pub volume: f64,
}

impl Default for BackgroundMusic {
    fn default() -> Self {
        Self {
            enabled: false,
            path: String::new(),
            volume: 0.08,
        }
    }
}

/// Video look and encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Name of the active style preset.
    pub style: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub preset: String,
    /// Available style presets by name.
    pub styles: HashMap<String, VideoStyle>,
    pub transitions: TransitionSettings,
    pub background_music: BackgroundMusic,
}

impl Default for VideoSettings {
    fn default() -> Self {
        let mut styles = HashMap::new();
        styles.insert("dark_tech".to_string(), VideoStyle::default());
        styles.insert(
            "minimal_white".to_string(),
            VideoStyle {
                background_color: "white".to_string(),
                text_color: "0x202020".to_string(),
                ..VideoStyle::default()
            },
        );
        styles.insert(
            "vertical_short".to_string(),
            VideoStyle {
                width: 1080,
                height: 1920,
                background_color: "black".to_string(),
                font_size: 64,
                ..VideoStyle::default()
            },
        );
        Self {
            style: "dark_tech".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            preset: "fast".to_string(),
            styles,
            transitions: TransitionSettings::default(),
            background_music: BackgroundMusic::default(),
        }
    }
}

impl VideoSettings {
    /// The active style preset.
    pub fn active_style(&self) -> Result<&VideoStyle> {
        self.styles
            .get(&self.style)
            .ok_or_else(|| ReelsmithError::Config(format!("Unknown video style '{}'", self.style)))
    }
}

/// Upload metadata settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub category: String,
    pub language: String,
    /// Tags placed ahead of the generated ones.
    pub default_tags: Vec<String>,
    pub max_tags: usize,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            category: "Science & Technology".to_string(),
            language: "en".to_string(),
            default_tags: Vec::new(),
            max_tags: 20,
        }
    }
}

/// Quality thresholds checked after synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityCheckSettings {
    pub enabled: bool,
    /// Maximum tolerated drift between estimated and actual narration length.
    pub max_sync_drift_sec: f64,
    /// Minimum number of timed visual assets.
    pub min_visual_assets: usize,
    /// Fail the run when a section cannot be synthesised.
    pub abort_on_tts_failure: bool,
    /// Fail the run when a quality threshold is breached.
    pub abort_on_quality_breach: bool,
}

impl Default for QualityCheckSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sync_drift_sec: 2.0,
            min_visual_assets: 3,
            abort_on_tts_failure: true,
            abort_on_quality_breach: false,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        Self::load_with_overrides(path, &[])
    }

    /// Load settings and apply dot-notation overrides (`llm.provider=openai`) on top.
    ///
    /// Overrides are applied to the raw TOML tree before deserialization, so an
    /// override naming an unknown provider fails exactly like a bad config file.
    pub fn load_with_overrides(path: Option<&PathBuf>, overrides: &[(String, toml::Value)]) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut tree = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<toml::Table>(&content)?
        } else {
            toml::Table::new()
        };

        for (key, value) in overrides {
            set_nested(&mut tree, key, value.clone())?;
        }

        let settings: Settings = toml::Value::Table(tree).try_into()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.script.words_per_minute == 0 {
            return Err(ReelsmithError::Config("script.words_per_minute must be positive".into()));
        }
        if self.script.sections.min > self.script.sections.max {
            return Err(ReelsmithError::Config(format!(
                "script.sections.min ({}) exceeds script.sections.max ({})",
                self.script.sections.min, self.script.sections.max
            )));
        }
        if self.search.max_queries == 0 {
            return Err(ReelsmithError::Config("search.max_queries must be positive".into()));
        }
        if self.voice.max_concurrent == 0 {
            return Err(ReelsmithError::Config("voice.max_concurrent must be positive".into()));
        }
        self.script.active_persona()?;
        let style = self.video.active_style()?;
        if style.width == 0 || style.height == 0 || style.fps == 0 {
            return Err(ReelsmithError::Config(format!(
                "video style '{}' needs a positive width, height and fps",
                self.video.style
            )));
        }
        let volume = self.video.background_music.volume;
        if !(0.0..=1.0).contains(&volume) {
            return Err(ReelsmithError::Config(format!(
                "video.background_music.volume must be between 0 and 1, got {}",
                volume
            )));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ReelsmithError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reelsmith")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.cache_dir)
    }

    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Environment variables the selected providers read. Each entry lists
    /// alternatives, any one of which is enough.
    pub fn required_env_vars(&self) -> Vec<&'static [&'static str]> {
        let mut vars = self.research_env_vars();
        match self.voice.provider {
            VoiceProviderKind::Elevenlabs => {
                vars.push(&["ELEVENLABS_API_KEY"]);
                vars.push(&["ELEVENLABS_VOICE_ID"]);
            }
            VoiceProviderKind::OpenaiTts => vars.push(&["OPENAI_TTS_API_KEY", "OPENAI_API_KEY"]),
            VoiceProviderKind::Azure => vars.push(&["AZURE_TTS_KEY"]),
        }
        vars
    }

    /// Variables needed by the LLM and search providers only.
    pub fn research_env_vars(&self) -> Vec<&'static [&'static str]> {
        let llm: &'static [&'static str] = match self.llm.provider {
            LlmProviderKind::Claude => &["ANTHROPIC_API_KEY"],
            LlmProviderKind::Openai => &["OPENAI_API_KEY"],
            LlmProviderKind::Gemini => &["GEMINI_API_KEY"],
        };
        let mut vars = vec![llm];
        match self.search.provider {
            SearchProviderKind::Google => {
                vars.push(&["GOOGLE_SEARCH_API_KEY"]);
                vars.push(&["GOOGLE_SEARCH_CX"]);
            }
            SearchProviderKind::Bing => vars.push(&["BING_SEARCH_API_KEY"]),
            SearchProviderKind::Serpapi => vars.push(&["SERPAPI_KEY"]),
            SearchProviderKind::Searx => {}
        }
        vars
    }
}

/// Read a required API key from the environment.
pub fn env_key(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ReelsmithError::Config(format!("Missing API key: set {}", var)))
}

/// Parse a `key=value` override, casting booleans and numbers.
pub fn parse_override(item: &str) -> Result<(String, toml::Value)> {
    let (key, raw) = item.split_once('=').ok_or_else(|| {
        ReelsmithError::InvalidInput(format!("--set must be in format key=value, got: {}", item))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ReelsmithError::InvalidInput(format!("Empty key in override: {}", item)));
    }

    let value = match raw.to_lowercase().as_str() {
        "true" => toml::Value::Boolean(true),
        "false" => toml::Value::Boolean(false),
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                toml::Value::Integer(i)
            } else if let Ok(f) = raw.parse::<f64>() {
                toml::Value::Float(f)
            } else {
                toml::Value::String(raw.to_string())
            }
        }
    };

    Ok((key.to_string(), value))
}

/// A per-topic override document: `{"topic": "...", "overrides": {"a.b": value}}`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TopicFile {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub overrides: serde_json::Map<String, serde_json::Value>,
}

impl TopicFile {
    /// Read a topic file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overrides converted to TOML values.
    pub fn toml_overrides(&self) -> Result<Vec<(String, toml::Value)>> {
        self.overrides
            .iter()
            .map(|(k, v)| {
                let value = toml::Value::try_from(v).map_err(|e| {
                    ReelsmithError::Config(format!("Override '{}' is not representable: {}", k, e))
                })?;
                Ok((k.clone(), value))
            })
            .collect()
    }
}

/// Set `tree["a"]["b"]["c"] = value` from `a.b.c`, creating tables as needed.
fn set_nested(tree: &mut toml::Table, dot_key: &str, value: toml::Value) -> Result<()> {
    let mut parts: Vec<&str> = dot_key.split('.').collect();
    let last = parts.pop().unwrap_or_default();
    let mut current = tree;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert(toml::Value::Table(toml::Table::new()));
        current = entry.as_table_mut().ok_or_else(|| {
            ReelsmithError::Config(format!("Cannot override '{}': '{}' is not a table", dot_key, part))
        })?;
    }
    current.insert(last.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.script.words_per_minute, 150);
        assert_eq!(settings.search.timeout_secs, 30);
        assert_eq!(settings.quality_checks.max_sync_drift_sec, 2.0);
    }

    #[test]
    fn test_overrides_apply_before_deserialization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\nprovider = \"gemini\"\n").unwrap();

        let overrides = vec![
            parse_override("search.top_pages_to_fetch=3").unwrap(),
            parse_override("voice.provider=azure").unwrap(),
            parse_override("quality_checks.abort_on_quality_breach=true").unwrap(),
        ];
        let settings = Settings::load_with_overrides(Some(&path), &overrides).unwrap();

        assert_eq!(settings.llm.provider, LlmProviderKind::Gemini);
        assert_eq!(settings.search.top_pages_to_fetch, 3);
        assert_eq!(settings.voice.provider, VoiceProviderKind::Azure);
        assert!(settings.quality_checks.abort_on_quality_breach);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let overrides = vec![parse_override("llm.provider=llama").unwrap()];
        assert!(Settings::load_with_overrides(Some(&path), &overrides).is_err());

        let err = "llama".parse::<LlmProviderKind>().unwrap_err();
        assert!(err.to_string().contains("claude, openai, gemini"));
    }

    #[test]
    fn test_parse_override_casts() {
        assert_eq!(parse_override("a=true").unwrap().1, toml::Value::Boolean(true));
        assert_eq!(parse_override("a=12").unwrap().1, toml::Value::Integer(12));
        assert_eq!(parse_override("a=1.5").unwrap().1, toml::Value::Float(1.5));
        assert_eq!(
            parse_override("a=minimal_white").unwrap().1,
            toml::Value::String("minimal_white".into())
        );
        assert!(parse_override("novalue").is_err());
    }

    #[test]
    fn test_zero_wpm_is_invalid() {
        let mut settings = Settings::default();
        settings.script.words_per_minute = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_topic_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topic.json");
        std::fs::write(
            &path,
            r#"{"topic": "Rust 2024 edition", "overrides": {"script.target_minutes": 5, "search.provider": "searx"}}"#,
        )
        .unwrap();

        let topic = TopicFile::load(&path).unwrap();
        assert_eq!(topic.topic, "Rust 2024 edition");
        let overrides = topic.toml_overrides().unwrap();
        let settings =
            Settings::load_with_overrides(Some(&dir.path().join("none.toml")), &overrides).unwrap();
        assert_eq!(settings.script.target_minutes, 5);
        assert_eq!(settings.search.provider, SearchProviderKind::Searx);
    }

    #[test]
    fn test_required_env_vars_follow_providers() {
        let mut settings = Settings::default();
        settings.search.provider = SearchProviderKind::Searx;
        settings.voice.provider = VoiceProviderKind::OpenaiTts;
        let vars = settings.required_env_vars();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0], &["ANTHROPIC_API_KEY"]);
        assert_eq!(vars[1], &["OPENAI_TTS_API_KEY", "OPENAI_API_KEY"]);
    }

    #[test]
    fn test_style_preset_is_selected_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.toml");

        let overrides = vec![parse_override("video.style=vertical_short").unwrap()];
        let settings = Settings::load_with_overrides(Some(&path), &overrides).unwrap();
        let style = settings.video.active_style().unwrap();
        assert_eq!((style.width, style.height), (1080, 1920));

        let overrides = vec![parse_override("video.style=neon").unwrap()];
        let err = Settings::load_with_overrides(Some(&path), &overrides).unwrap_err();
        assert!(err.to_string().contains("Unknown video style 'neon'"));
    }

    #[test]
    fn test_video_options_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[video]
style = "custom"

[video.styles.custom]
width = 1280
height = 720

[video.transitions]
type = "wipeleft"
duration = 0.25

[video.background_music]
enabled = true
path = "~/music/bed.mp3"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        let style = settings.video.active_style().unwrap();
        assert_eq!((style.width, style.height, style.fps), (1280, 720, 30));
        assert_eq!(settings.video.transitions.kind, "wipeleft");
        assert!(settings.video.transitions.is_enabled());
        assert!(settings.video.background_music.enabled);
        assert_eq!(settings.video.background_music.volume, 0.08);
        assert_eq!(settings.metadata.max_tags, 20);
    }

    #[test]
    fn test_saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut settings = Settings::default();
        settings.video.style = "minimal_white".to_string();
        settings.metadata.default_tags = vec!["tech".to_string()];
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.video.active_style().unwrap().background_color, "white");
        assert_eq!(loaded.video.styles.len(), 3);
        assert_eq!(loaded.video.transitions, TransitionSettings::default());
        assert_eq!(loaded.metadata.default_tags, vec!["tech"]);
    }

    #[test]
    fn test_music_volume_out_of_range_is_invalid() {
        let mut settings = Settings::default();
        settings.video.background_music.volume = 1.5;
        assert!(settings.validate().is_err());
        settings.video.background_music.volume = 0.2;
        settings.video.transitions.kind = "none".to_string();
        assert!(settings.validate().is_ok());
        assert!(!settings.video.transitions.is_enabled());
    }
}
