//! Pipeline orchestrator for Reelsmith.
//!
//! Runs research, scripting, visual collection, narration, synchronization,
//! assembly and metadata strictly in that order, and turns any failure into a
//! [`PipelineResult`] instead of an error.

use crate::assembly::{safe_stem, FfmpegAssembler, VideoAssembler};
use crate::config::{Prompts, Settings};
use crate::error::{ReelsmithError, Result};
use crate::llm::{create_llm, LlmClient};
use crate::metadata::{MetadataGenerator, VideoMetadata};
use crate::research::{FindingCache, HttpPageFetcher, PageFetcher, ResearchResult, ResearchService};
use crate::script::{ScriptGenerator, VideoScript};
use crate::search::{create_search_provider, SearchProvider};
use crate::sync::{assign_timings, quality_report, QualityReport, TimedAsset};
use crate::visuals::{RoutingCollector, VisualCollector, VisualService};
use crate::voice::{create_voice, AudioTools, FfmpegAudio, VoiceService, VoiceSynthesizer};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// External collaborators used by a pipeline.
pub struct PipelineComponents {
    pub llm: Arc<dyn LlmClient>,
    pub search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub voice: Arc<dyn VoiceSynthesizer>,
    pub audio: Arc<dyn AudioTools>,
    pub collector: Arc<dyn VisualCollector>,
    pub assembler: Arc<dyn VideoAssembler>,
}

impl PipelineComponents {
    /// Build the providers selected in `settings`. Fails on missing API keys.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.search.timeout_secs))
            .user_agent(settings.search.user_agent.clone())
            .build()?;

        Ok(Self {
            llm: create_llm(&settings.llm)?,
            search: create_search_provider(&settings.search, http.clone())?,
            fetcher: Arc::new(HttpPageFetcher::new(http.clone(), settings.search.max_page_chars)),
            voice: create_voice(&settings.voice, http)?,
            audio: Arc::new(FfmpegAudio),
            collector: Arc::new(RoutingCollector::from_settings(
                &settings.visuals,
                settings.video.active_style()?,
            )),
            assembler: Arc::new(FfmpegAssembler::new(settings.video.clone(), settings.output_dir())?),
        })
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub topic: String,
    pub success: bool,
    pub video_path: Option<PathBuf>,
    /// Script, timed assets and quality report as JSON.
    pub script_path: Option<PathBuf>,
    /// Upload metadata as JSON.
    pub metadata_path: Option<PathBuf>,
    pub metadata: Option<VideoMetadata>,
    pub error_message: Option<String>,
    pub pipeline_log: Vec<String>,
    pub quality: Option<QualityReport>,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
}

#[derive(Serialize)]
struct RunReport<'a> {
    run_id: Uuid,
    script: &'a VideoScript,
    timed_assets: &'a [TimedAsset],
    quality: &'a QualityReport,
    key_facts: &'a [String],
    sources: Vec<&'a str>,
}

/// Human-readable progress kept alongside tracing output.
struct RunLog {
    lines: Mutex<Vec<String>>,
    echo: bool,
}

impl RunLog {
    fn new(echo: bool) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            echo,
        }
    }

    fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        if self.echo {
            eprintln!("  {}", message);
        }
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message);
        }
    }

    fn into_lines(self) -> Vec<String> {
        self.lines.into_inner().unwrap_or_default()
    }
}

/// The main Reelsmith pipeline.
pub struct Pipeline {
    settings: Settings,
    llm_name: String,
    search_name: String,
    voice_name: String,
    research: ResearchService,
    scripts: ScriptGenerator,
    visuals: VisualService,
    voice: VoiceService,
    assembler: Arc<dyn VideoAssembler>,
    metadata: MetadataGenerator,
    echo: bool,
}

impl Pipeline {
    /// Create a pipeline with the providers selected in `settings`.
    pub fn new(settings: Settings) -> Result<Self> {
        let components = PipelineComponents::from_settings(&settings)?;
        Self::with_components(settings, components)
    }

    /// Create a pipeline with custom components.
    pub fn with_components(settings: Settings, components: PipelineComponents) -> Result<Self> {
        settings.validate()?;
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let cache = FindingCache::new(&settings.cache_dir())?;

        let llm_name = format!("{}/{}", components.llm.provider_name(), components.llm.model());
        let search_name = components.search.provider_name().to_string();
        let voice_name = components.voice.provider_name().to_string();

        let research = ResearchService::new(
            components.llm.clone(),
            components.search,
            components.fetcher,
            cache,
            settings.search.clone(),
        )
        .with_prompts(prompts.clone());
        let scripts = ScriptGenerator::new(components.llm.clone(), settings.script.clone())
            .with_prompts(prompts.clone())
            .with_temperature(settings.llm.temperature);
        let metadata = MetadataGenerator::new(components.llm, settings.metadata.clone()).with_prompts(prompts);
        let visuals = VisualService::new(components.collector);
        let voice = VoiceService::new(
            components.voice,
            &settings.voice,
            settings.quality_checks.abort_on_tts_failure,
        )
        .with_tools(components.audio);

        Ok(Self {
            settings,
            llm_name,
            search_name,
            voice_name,
            research,
            scripts,
            visuals,
            voice,
            assembler: components.assembler,
            metadata,
            echo: false,
        })
    }

    /// Echo progress lines to stderr.
    pub fn with_progress(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run only the research stage.
    pub async fn research(&self, topic: &str) -> Result<ResearchResult> {
        self.research.research(topic).await
    }

    /// Run the whole pipeline for `topic`. Never returns an error; failures are
    /// reported through [`PipelineResult::error_message`].
    #[instrument(skip(self))]
    pub async fn run(&self, topic: &str) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let log = RunLog::new(self.echo);

        let mut result = PipelineResult {
            run_id,
            topic: topic.to_string(),
            success: false,
            video_path: None,
            script_path: None,
            metadata_path: None,
            metadata: None,
            error_message: None,
            pipeline_log: Vec::new(),
            quality: None,
            started_at,
            elapsed_seconds: 0.0,
        };

        let work_dir = self.settings.temp_dir().join(run_id.simple().to_string());
        match self.execute(topic, &work_dir, &log, &mut result).await {
            Ok(()) => {
                result.success = true;
                log.log(format!("Done in {:.1}s", clock.elapsed().as_secs_f64()));
            }
            Err(e) => {
                error!("Pipeline failed: {}", e);
                log.log(format!("Failed: {}", e));
                result.error_message = Some(e.to_string());
            }
        }

        result.elapsed_seconds = clock.elapsed().as_secs_f64();
        result.pipeline_log = log.into_lines();
        result
    }

    async fn execute(&self, topic: &str, work_dir: &Path, log: &RunLog, result: &mut PipelineResult) -> Result<()> {
        if topic.trim().is_empty() {
            return Err(ReelsmithError::InvalidInput("Topic must not be empty".to_string()));
        }
        log.log(format!(
            "Pipeline '{}' | LLM={} Search={} Voice={}",
            topic, self.llm_name, self.search_name, self.voice_name
        ));

        log.log("1/7 Research");
        let research = self.research.research(topic).await?;
        log.log(format!(
            "  {} facts from {} sources",
            research.key_facts.len(),
            research.findings.len()
        ));

        log.log("2/7 Script");
        let script = self.scripts.generate(&research).await?;
        log.log(format!(
            "  '{}': {} sections, ~{:.1} min estimated",
            script.title,
            script.sections.len(),
            script.total_estimated_seconds / 60.0
        ));

        log.log("3/7 Visuals");
        let assets = self.visuals.collect_all(&script, &work_dir.join("visuals")).await?;
        log.log(format!("  {}/{} markers captured", assets.len(), script.marker_count()));

        log.log("4/7 Voice");
        let chunks = self.voice.synthesise_script(&script, &work_dir.join("audio")).await?;
        log.log(format!(
            "  {:.1}s narrated",
            chunks.iter().map(|c| c.duration_seconds).sum::<f64>()
        ));

        log.log("5/7 Sync");
        let timed = assign_timings(&script, &chunks, &assets)?;
        let quality = quality_report(&script, &chunks, &timed, &self.settings.quality_checks);
        log.log(format!(
            "  {} assets timed, drift {:.2}s",
            timed.len(),
            quality.cumulative_drift_seconds
        ));
        for warning in &quality.warnings {
            log.log(format!("  warning: {}", warning));
        }
        for section in &quality.silent_sections {
            log.log(format!("  warning: section '{}' is silent", section));
        }
        result.quality = Some(quality.clone());

        let stem = safe_stem(&script.title);
        result.script_path = Some(self.write_report(&stem, result.run_id, &research, &script, &timed, &quality).await?);

        if !quality.passed() && self.settings.quality_checks.abort_on_quality_breach {
            return Err(ReelsmithError::Quality(quality.warnings.join("; ")));
        }

        log.log("6/7 Assembly");
        let video_path = self
            .assembler
            .assemble(&chunks, &timed, &stem, &work_dir.join("assembly"))
            .await?;
        log.log(format!("  {}", video_path.display()));
        result.video_path = Some(video_path);

        log.log("7/7 Metadata");
        let metadata = self.metadata.generate(&script, &research).await;
        let metadata_path = self.settings.output_dir().join(format!("{}_metadata.json", stem));
        tokio::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?).await?;
        log.log(format!("  {}", metadata_path.display()));
        result.metadata_path = Some(metadata_path);
        result.metadata = Some(metadata);

        Ok(())
    }

    async fn write_report(
        &self,
        stem: &str,
        run_id: Uuid,
        research: &ResearchResult,
        script: &VideoScript,
        timed: &[TimedAsset],
        quality: &QualityReport,
    ) -> Result<PathBuf> {
        let output_dir = self.settings.output_dir();
        tokio::fs::create_dir_all(&output_dir).await?;

        let report = RunReport {
            run_id,
            script,
            timed_assets: timed,
            quality,
            key_facts: &research.key_facts,
            sources: research.findings.iter().map(|f| f.url.as_str()).collect(),
        };
        let path = output_dir.join(format!("{}_script.json", stem));
        tokio::fs::write(&path, serde_json::to_string_pretty(&report)?).await?;
        if !quality.passed() {
            warn!("Quality checks reported {} warning(s)", quality.warnings.len());
        }
        Ok(path)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::config::QualityCheckSettings;
    use crate::llm::testing::ScriptedLlm;

    #[tokio::test]
    async fn test_run_produces_video_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), llm(), QualityCheckSettings::default());

        let result = pipeline.run("gadget").await;
        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(result.video_path, Some(dir.path().join("out").join("Gadget_Launch.mp4")));

        let quality = result.quality.unwrap();
        assert_eq!(quality.asset_count, 3);
        assert!(quality.cumulative_drift_seconds < 1e-9);
        assert!(quality.passed());

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(result.script_path.unwrap()).unwrap()).unwrap();
        assert_eq!(report["timed_assets"].as_array().unwrap().len(), 3);
        assert_eq!(report["script"]["sections"][1]["section_id"], "body");
        assert!(result.pipeline_log.iter().any(|l| l.starts_with("6/7 Assembly")));
    }

    #[tokio::test]
    async fn test_run_writes_metadata_after_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let result = pipeline(dir.path(), llm(), QualityCheckSettings::default()).run("gadget").await;
        assert!(result.success, "{:?}", result.error_message);

        let metadata_path = result.metadata_path.unwrap();
        assert_eq!(metadata_path, dir.path().join("out").join("Gadget_Launch_metadata.json"));
        let written: VideoMetadata =
            serde_json::from_str(&std::fs::read_to_string(&metadata_path).unwrap()).unwrap();
        assert_eq!(written.title, "Gadget Launch Explained");
        assert_eq!(written.tags, vec!["gadgets"]);
        assert_eq!(written.category, "Science & Technology");
        assert_eq!(result.metadata, Some(written));

        let assembly = result.pipeline_log.iter().position(|l| l.starts_with("6/7")).unwrap();
        let metadata = result.pipeline_log.iter().position(|l| l.starts_with("7/7")).unwrap();
        assert!(assembly < metadata);
    }

    #[tokio::test]
    async fn test_metadata_failure_does_not_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![
            Ok(r#"["gadget launch"]"#),
            Ok(r#"{"key_facts": ["It shipped"], "structured_summary": "Shipped"}"#),
            Ok(SCRIPT),
            Err("overloaded"),
        ]);
        let result = pipeline(dir.path(), llm, QualityCheckSettings::default()).run("gadget").await;

        assert!(result.success, "{:?}", result.error_message);
        let metadata = result.metadata.unwrap();
        assert_eq!(metadata.title, "Gadget Launch");
        assert!(metadata.description.starts_with("Shipped"));
    }

    #[tokio::test]
    async fn test_concurrent_runs_use_separate_work_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = fake_assembler(dir.path());
        let first = pipeline_with_assembler(dir.path(), llm(), QualityCheckSettings::default(), assembler.clone());
        let second = pipeline_with_assembler(dir.path(), llm(), QualityCheckSettings::default(), assembler.clone());

        let (a, b) = tokio::join!(first.run("gadget"), second.run("gadget"));
        assert!(a.success && b.success);

        let work_dirs = assembler.work_dirs.lock().unwrap().clone();
        assert_eq!(work_dirs.len(), 2);
        assert_ne!(work_dirs[0], work_dirs[1]);
        let runs = [a.run_id.simple().to_string(), b.run_id.simple().to_string()];
        for work_dir in &work_dirs {
            assert!(work_dir.starts_with(dir.path().join("tmp")));
            assert!(runs.iter().any(|run| work_dir.to_string_lossy().contains(run.as_str())));
        }
    }

    #[tokio::test]
    async fn test_quality_breach_aborts_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let quality = QualityCheckSettings {
            min_visual_assets: 10,
            abort_on_quality_breach: true,
            ..QualityCheckSettings::default()
        };
        let result = pipeline(dir.path(), llm(), quality).run("gadget").await;

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("visual assets"));
        assert!(result.video_path.is_none());
        assert!(result.metadata_path.is_none());
        assert!(result.script_path.is_some());
    }

    #[tokio::test]
    async fn test_unparsable_script_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![
            Ok(r#"["q"]"#),
            Ok("{}"),
            Ok("no script today"),
        ]);
        let result = pipeline(dir.path(), llm, QualityCheckSettings::default()).run("gadget").await;

        assert!(!result.success);
        assert!(result.error_message.unwrap().starts_with("Script error"));
        assert!(result.pipeline_log.iter().any(|l| l.starts_with("Failed")));
    }

    #[tokio::test]
    async fn test_empty_topic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = pipeline(dir.path(), llm(), QualityCheckSettings::default()).run("  ").await;
        assert!(!result.success);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_run_future_is_send() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), llm(), QualityCheckSettings::default());
        assert_send(&pipeline.run("gadget"));
    }
}
