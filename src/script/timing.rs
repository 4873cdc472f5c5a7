//! Estimated timeline construction.

use super::markers::{clean_narration, extract_markers};
use super::{RawSection, ScriptSection, VideoScript};
use crate::error::{ReelsmithError, Result};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Spoken duration of `words` at `words_per_minute`.
pub fn estimate_duration(words: usize, words_per_minute: u32) -> f64 {
    words as f64 / words_per_minute as f64 * 60.0
}

/// Turn raw sections into a [`VideoScript`] on an estimated timeline.
///
/// Each section starts where the previous one ends; the first starts at 0.
pub fn build_script(
    topic: &str,
    title: Option<&str>,
    raw_sections: Vec<RawSection>,
    words_per_minute: u32,
) -> Result<VideoScript> {
    if words_per_minute == 0 {
        return Err(ReelsmithError::Config(
            "script.words_per_minute must be greater than zero".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    let mut sections = Vec::with_capacity(raw_sections.len());
    let mut clock = 0.0;

    for (index, raw) in raw_sections.into_iter().enumerate() {
        let mut section_id = raw
            .section_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("s{}", index));
        if !seen_ids.insert(section_id.clone()) {
            let mut suffix = index;
            let mut renamed = format!("{}_{}", section_id, suffix);
            while !seen_ids.insert(renamed.clone()) {
                suffix += 1;
                renamed = format!("{}_{}", section_id, suffix);
            }
            warn!("Duplicate section id '{}', renamed to '{}'", section_id, renamed);
            section_id = renamed;
        }

        let visual_markers = extract_markers(&raw.narration_text, &section_id);
        let narration_text = clean_narration(&raw.narration_text);
        let duration = estimate_duration(narration_text.split_whitespace().count(), words_per_minute);

        debug!(
            "Section {}: {:.1}s, {} markers",
            section_id,
            duration,
            visual_markers.len()
        );

        sections.push(ScriptSection {
            section_id,
            section_type: raw
                .section_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "main".to_string()),
            title: raw.title.unwrap_or_default(),
            narration_text,
            visual_markers,
            estimated_duration_seconds: duration,
            estimated_start_time: clock,
        });
        clock += duration;
    }

    let full_text = sections
        .iter()
        .map(|s| s.narration_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(VideoScript {
        topic: topic.to_string(),
        title: title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(topic)
            .to_string(),
        sections,
        full_text,
        total_estimated_seconds: clock,
    })
}
