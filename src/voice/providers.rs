//! Text-to-speech adapters.

use super::VoiceSynthesizer;
use crate::config::{env_key, AzureVoice, ElevenLabsVoice, OpenAiTtsVoice};
use crate::error::{ReelsmithError, Result};
use crate::openai::create_client;
use async_openai::types::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice};
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

const ELEVENLABS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const AZURE_OUTPUT_FORMAT: &str = "audio-48khz-192kbitrate-mono-mp3";

async fn write_audio(response: reqwest::Response, output_path: &Path, provider: &str) -> Result<()> {
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(ReelsmithError::Voice(format!(
            "{} {}: {}",
            provider,
            status,
            body.chars().take(300).collect::<String>()
        )));
    }
    let bytes = response.bytes().await?;
    tokio::fs::write(output_path, &bytes).await?;
    debug!("{} wrote {} bytes to {}", provider, bytes.len(), output_path.display());
    Ok(())
}

/// ElevenLabs text-to-speech. Needs `ELEVENLABS_API_KEY` and `ELEVENLABS_VOICE_ID`.
pub struct ElevenLabsTts {
    http: reqwest::Client,
    api_key: String,
    voice_id: String,
    voice: ElevenLabsVoice,
}

impl ElevenLabsTts {
    pub fn from_env(http: reqwest::Client, voice: ElevenLabsVoice) -> Result<Self> {
        Ok(Self {
            http,
            api_key: env_key("ELEVENLABS_API_KEY")?,
            voice_id: env_key("ELEVENLABS_VOICE_ID")?,
            voice,
        })
    }
}

#[async_trait]
impl VoiceSynthesizer for ElevenLabsTts {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn synthesise(&self, text: &str, output_path: &Path) -> Result<()> {
        let body = json!({
            "text": text,
            "model_id": self.voice.model,
            "voice_settings": {
                "stability": self.voice.stability,
                "similarity_boost": self.voice.similarity_boost,
                "style": self.voice.style,
                "use_speaker_boost": self.voice.use_speaker_boost,
            },
        });

        let response = self
            .http
            .post(format!("{}/{}", ELEVENLABS_URL, self.voice_id))
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await?;

        write_audio(response, output_path, "ElevenLabs").await
    }

    fn provider_name(&self) -> &str {
        "elevenlabs"
    }
}

/// OpenAI speech endpoint. Uses `OPENAI_TTS_API_KEY`, falling back to `OPENAI_API_KEY`.
pub struct OpenAiTts {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
    speed: f32,
}

impl OpenAiTts {
    pub fn from_env(settings: OpenAiTtsVoice) -> Result<Self> {
        // Both enums deserialize from the API's own lowercase names.
        let model: SpeechModel = serde_json::from_value(json!(settings.model))
            .map_err(|_| ReelsmithError::Config(format!("Unknown OpenAI TTS model '{}'", settings.model)))?;
        let voice: Voice = serde_json::from_value(json!(settings.voice_name)).map_err(|_| {
            ReelsmithError::Config(format!("Unknown OpenAI voice '{}'", settings.voice_name))
        })?;

        Ok(Self {
            client: create_client(&["OPENAI_TTS_API_KEY", "OPENAI_API_KEY"], Duration::from_secs(120))?,
            model,
            voice,
            speed: settings.speed,
        })
    }
}

#[async_trait]
impl VoiceSynthesizer for OpenAiTts {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn synthesise(&self, text: &str, output_path: &Path) -> Result<()> {
        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .model(self.model.clone())
            .voice(self.voice.clone())
            .speed(self.speed)
            .response_format(SpeechResponseFormat::Mp3)
            .build()
            .map_err(|e| ReelsmithError::Voice(e.to_string()))?;

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| ReelsmithError::OpenAI(format!("Speech request failed: {}", e)))?;

        tokio::fs::write(output_path, &response.bytes).await?;
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "openai_tts"
    }
}

/// Azure Cognitive Services speech. Needs `AZURE_TTS_KEY`; region from
/// `AZURE_TTS_REGION` or the configured default.
pub struct AzureTts {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    voice: AzureVoice,
}

impl AzureTts {
    pub fn from_env(http: reqwest::Client, voice: AzureVoice) -> Result<Self> {
        let region = std::env::var("AZURE_TTS_REGION")
            .ok()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| voice.region.clone());
        Ok(Self {
            http,
            api_key: env_key("AZURE_TTS_KEY")?,
            endpoint: format!("https://{}.tts.speech.microsoft.com/cognitiveservices/v1", region),
            voice,
        })
    }
}

/// Build the SSML document for Azure, escaping the narration.
fn azure_ssml(text: &str, voice: &AzureVoice) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;");
    format!(
        "<speak version='1.0' xml:lang='en-US'><voice name='{}'><prosody rate='{}' pitch='{}'>{}</prosody></voice></speak>",
        voice.voice_name, voice.rate, voice.pitch, escaped
    )
}

#[async_trait]
impl VoiceSynthesizer for AzureTts {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn synthesise(&self, text: &str, output_path: &Path) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", AZURE_OUTPUT_FORMAT)
            .body(azure_ssml(text, &self.voice))
            .send()
            .await?;

        write_audio(response, output_path, "Azure TTS").await
    }

    fn provider_name(&self) -> &str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azure_ssml_escapes_text() {
        let ssml = azure_ssml("Rust & <C++>", &AzureVoice::default());
        assert!(ssml.contains("Rust &amp; &lt;C++&gt;"));
        assert!(ssml.contains("<voice name='en-US-GuyNeural'>"));
    }
}
