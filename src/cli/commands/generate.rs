//! Generate command - run the full topic-to-video pipeline.

use crate::cli::output::{format_duration, format_size};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Settings, TopicFile};
use crate::orchestrator::{Pipeline, PipelineResult};
use anyhow::{bail, Result};
use std::path::PathBuf;

/// Run the generate command.
///
/// With a topic file, its overrides are applied first and the `--set`
/// overrides on top of them, so the command line always wins.
pub async fn run_generate(
    topic: Option<String>,
    topic_file: Option<PathBuf>,
    config_path: Option<&PathBuf>,
    cli_overrides: &[(String, toml::Value)],
    settings: Settings,
) -> Result<()> {
    let (topic, settings) = match topic_file {
        Some(path) => {
            let file = TopicFile::load(&path)?;
            let mut overrides = file.toml_overrides()?;
            overrides.extend(cli_overrides.iter().cloned());
            let settings = Settings::load_with_overrides(config_path, &overrides)?;
            let topic = topic.unwrap_or(file.topic);
            (topic, settings)
        }
        None => (topic.unwrap_or_default(), settings),
    };

    if topic.trim().is_empty() {
        bail!("No topic given. Use --topic or a topic file with a \"topic\" field.");
    }

    preflight::check(Operation::Generate, &settings)?;

    Output::header(&format!("Generating: {}", topic));
    Output::kv("LLM", &format!("{} ({})", settings.llm.provider, settings.llm.active_model()));
    Output::kv("Search", &settings.search.provider.to_string());
    Output::kv("Voice", &settings.voice.provider.to_string());
    println!();

    let pipeline = Pipeline::new(settings)?.with_progress(true);
    let result = pipeline.run(&topic).await;

    print_result(&result);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_result(result: &PipelineResult) {
    println!();
    if result.success {
        Output::success(&format!("Video ready in {}", format_duration(result.elapsed_seconds)));
    } else {
        Output::error(&format!(
            "Pipeline failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        ));
    }

    Output::kv("Run", &result.run_id.to_string());
    if let Some(video) = &result.video_path {
        let size = std::fs::metadata(video)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        Output::kv("Video", &format!("{} ({})", video.display(), size));
    }
    if let Some(script) = &result.script_path {
        Output::kv("Report", &script.display().to_string());
    }
    if let Some(metadata) = &result.metadata_path {
        Output::kv("Metadata", &metadata.display().to_string());
    }
    if let Some(metadata) = &result.metadata {
        Output::kv("Title", &metadata.title);
        Output::kv("Tags", &metadata.tags.join(", "));
    }

    if let Some(quality) = &result.quality {
        Output::kv(
            "Duration",
            &format!(
                "{} actual / {} estimated",
                format_duration(quality.total_actual_seconds),
                format_duration(quality.total_estimated_seconds)
            ),
        );
        Output::kv(
            "Visuals",
            &format!("{} of {} cues captured", quality.asset_count, quality.marker_count),
        );
        for warning in &quality.warnings {
            Output::warning(warning);
        }
    }
}
