//! Narration synthesis.
//!
//! Each script section is spoken into its own audio file. The measured length of
//! those files, not the word-count estimate, drives the final timeline.

mod providers;

pub use providers::{AzureTts, ElevenLabsTts, OpenAiTts};

use crate::config::{VoiceProviderKind, VoiceSettings};
use crate::error::{ReelsmithError, Result};
use crate::media;
use crate::script::{ScriptSection, VideoScript};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Audio for one script section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceChunk {
    pub section_id: String,
    pub audio_path: PathBuf,
    pub duration_seconds: f64,
    /// True when the chunk is generated silence rather than speech.
    #[serde(default)]
    pub silent: bool,
}

/// Text-to-speech backend.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    /// Speak `text` into an audio file at `output_path`.
    async fn synthesise(&self, text: &str, output_path: &Path) -> Result<()>;

    fn provider_name(&self) -> &str;
}

/// Audio file measurement and silence generation.
#[async_trait]
pub trait AudioTools: Send + Sync {
    async fn duration(&self, path: &Path) -> Result<f64>;

    async fn silence(&self, path: &Path, seconds: f64) -> Result<()>;
}

/// [`AudioTools`] backed by ffprobe and ffmpeg.
pub struct FfmpegAudio;

#[async_trait]
impl AudioTools for FfmpegAudio {
    async fn duration(&self, path: &Path) -> Result<f64> {
        media::media_duration(path).await
    }

    async fn silence(&self, path: &Path, seconds: f64) -> Result<()> {
        media::write_silence(path, seconds).await
    }
}

/// Create the configured voice backend.
pub fn create_voice(settings: &VoiceSettings, http: reqwest::Client) -> Result<Arc<dyn VoiceSynthesizer>> {
    let voice: Arc<dyn VoiceSynthesizer> = match settings.provider {
        VoiceProviderKind::Elevenlabs => Arc::new(ElevenLabsTts::from_env(http, settings.elevenlabs.clone())?),
        VoiceProviderKind::OpenaiTts => Arc::new(OpenAiTts::from_env(settings.openai_tts.clone())?),
        VoiceProviderKind::Azure => Arc::new(AzureTts::from_env(http, settings.azure.clone())?),
    };
    Ok(voice)
}

/// Synthesises every section of a script.
pub struct VoiceService {
    narrator: Narrator,
    max_concurrent: usize,
}

impl VoiceService {
    pub fn new(voice: Arc<dyn VoiceSynthesizer>, settings: &VoiceSettings, abort_on_failure: bool) -> Self {
        Self {
            narrator: Narrator {
                voice,
                tools: Arc::new(FfmpegAudio),
                abort_on_failure,
            },
            max_concurrent: settings.max_concurrent.max(1),
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn AudioTools>) -> Self {
        self.narrator.tools = tools;
        self
    }

    /// Produce one chunk per section, in section order.
    ///
    /// A failed section aborts the run when `abort_on_failure` is set; otherwise it
    /// is replaced with silence lasting its estimated duration.
    #[instrument(skip(self, script, work_dir), fields(provider = self.narrator.voice.provider_name()))]
    pub async fn synthesise_script(&self, script: &VideoScript, work_dir: &Path) -> Result<Vec<VoiceChunk>> {
        tokio::fs::create_dir_all(work_dir).await?;

        let jobs: Vec<(usize, ScriptSection, PathBuf)> = script
            .sections
            .iter()
            .enumerate()
            .map(|(index, section)| {
                let path = work_dir.join(format!("{:02}_{}.mp3", index, file_safe(&section.section_id)));
                (index, section.clone(), path)
            })
            .collect();

        let results: Vec<(usize, Result<VoiceChunk>)> = stream::iter(jobs)
            .map(|(index, section, path)| {
                let narrator = self.narrator.clone();
                async move { (index, narrator.speak(&section, path).await) }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut ordered: Vec<Option<VoiceChunk>> = vec![None; script.sections.len()];
        for (index, result) in results {
            ordered[index] = Some(result?);
        }
        let chunks: Vec<VoiceChunk> = ordered.into_iter().flatten().collect();

        info!(
            "Synthesised {} sections, {:.1}s of audio",
            chunks.len(),
            chunks.iter().map(|c| c.duration_seconds).sum::<f64>()
        );
        Ok(chunks)
    }
}

/// Per-section synthesis, cloned into each concurrent job.
#[derive(Clone)]
struct Narrator {
    voice: Arc<dyn VoiceSynthesizer>,
    tools: Arc<dyn AudioTools>,
    abort_on_failure: bool,
}

impl Narrator {
    async fn speak(&self, section: &ScriptSection, path: PathBuf) -> Result<VoiceChunk> {
        if section.narration_text.trim().is_empty() {
            debug!("Section {} has no narration", section.section_id);
            return Ok(VoiceChunk {
                section_id: section.section_id.clone(),
                audio_path: path,
                duration_seconds: 0.0,
                silent: true,
            });
        }

        let spoken = async {
            self.voice.synthesise(&section.narration_text, &path).await?;
            self.tools.duration(&path).await
        }
        .await;

        match spoken {
            Ok(duration) => {
                debug!("Section {}: {:.2}s", section.section_id, duration);
                Ok(VoiceChunk {
                    section_id: section.section_id.clone(),
                    audio_path: path,
                    duration_seconds: duration,
                    silent: false,
                })
            }
            Err(e) if self.abort_on_failure => Err(ReelsmithError::Voice(format!(
                "section '{}': {}",
                section.section_id, e
            ))),
            Err(e) => {
                warn!(
                    "TTS failed for section {}, inserting {:.1}s of silence: {}",
                    section.section_id, section.estimated_duration_seconds, e
                );
                self.tools
                    .silence(&path, section.estimated_duration_seconds)
                    .await?;
                // Measured, since the encoder pads to whole frames
                let duration_seconds = self.tools.duration(&path).await?;
                Ok(VoiceChunk {
                    section_id: section.section_id.clone(),
                    audio_path: path,
                    duration_seconds,
                    silent: true,
                })
            }
        }
    }
}

fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
