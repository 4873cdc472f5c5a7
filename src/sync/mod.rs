//! Maps visual assets onto the narration timeline.
//!
//! Section windows come from the measured voice chunks, not from the word-count
//! estimate. Inside a section, markers split the window evenly in the order they
//! appear in the narration. This is a positional heuristic: it does not try to
//! align a marker with the words it sits next to.

use crate::config::QualityCheckSettings;
use crate::error::{ReelsmithError, Result};
use crate::script::{VideoScript, VisualMarker};
use crate::visuals::CapturedAsset;
use crate::voice::VoiceChunk;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tracing::{debug, warn};

/// An asset placed on the final timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedAsset {
    pub marker: VisualMarker,
    pub asset_path: PathBuf,
    pub start_time: f64,
    pub end_time: f64,
    pub section_id: String,
}

impl TimedAsset {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Place captured assets on the timeline defined by `chunks`.
///
/// `chunks` must be one per section, in section order. Markers whose asset was
/// not captured are dropped; their window stays unused.
pub fn assign_timings(
    script: &VideoScript,
    chunks: &[VoiceChunk],
    assets: &[CapturedAsset],
) -> Result<Vec<TimedAsset>> {
    if chunks.len() != script.sections.len() {
        return Err(ReelsmithError::Sync(format!(
            "{} voice chunks for {} sections",
            chunks.len(),
            script.sections.len()
        )));
    }

    // Identical markers in one section are matched to their assets in order.
    let mut available: HashMap<&VisualMarker, VecDeque<&CapturedAsset>> = HashMap::new();
    for asset in assets {
        available.entry(&asset.marker).or_default().push_back(asset);
    }

    let mut timed = Vec::new();
    let mut clock = 0.0;

    for (section, chunk) in script.sections.iter().zip(chunks) {
        if section.section_id != chunk.section_id {
            return Err(ReelsmithError::Sync(format!(
                "voice chunk '{}' does not match section '{}'",
                chunk.section_id, section.section_id
            )));
        }

        let start = clock;
        let duration = chunk.duration_seconds;
        let count = section.visual_markers.len();

        for (k, marker) in section.visual_markers.iter().enumerate() {
            let Some(asset) = available.get_mut(marker).and_then(VecDeque::pop_front) else {
                debug!("No asset for {} marker '{}'", marker.marker_type, marker.value());
                continue;
            };
            timed.push(TimedAsset {
                marker: marker.clone(),
                asset_path: asset.path.clone(),
                start_time: start + k as f64 * duration / count as f64,
                end_time: start + (k + 1) as f64 * duration / count as f64,
                section_id: section.section_id.clone(),
            });
        }

        clock += duration;
    }

    Ok(timed)
}

/// Drift and asset-count checks for a synchronized run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub marker_count: usize,
    pub asset_count: usize,
    pub total_estimated_seconds: f64,
    pub total_actual_seconds: f64,
    /// `|total estimated - total actual|`.
    pub cumulative_drift_seconds: f64,
    /// Sum of per-section `|estimated - actual|`.
    pub section_drift_seconds: f64,
    /// Sections synthesised as silence after a TTS failure.
    pub silent_sections: Vec<String>,
    pub warnings: Vec<String>,
}

impl QualityReport {
    pub fn passed(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Compare the estimated timeline with what was actually synthesised.
pub fn quality_report(
    script: &VideoScript,
    chunks: &[VoiceChunk],
    timed: &[TimedAsset],
    settings: &QualityCheckSettings,
) -> QualityReport {
    let total_actual_seconds: f64 = chunks.iter().map(|c| c.duration_seconds).sum();
    let section_drift_seconds = script
        .sections
        .iter()
        .zip(chunks)
        .map(|(s, c)| (s.estimated_duration_seconds - c.duration_seconds).abs())
        .sum();

    let mut report = QualityReport {
        marker_count: script.marker_count(),
        asset_count: timed.len(),
        total_estimated_seconds: script.total_estimated_seconds,
        total_actual_seconds,
        cumulative_drift_seconds: (script.total_estimated_seconds - total_actual_seconds).abs(),
        section_drift_seconds,
        silent_sections: chunks
            .iter()
            .filter(|c| c.silent && c.duration_seconds > 0.0)
            .map(|c| c.section_id.clone())
            .collect(),
        warnings: Vec::new(),
    };

    if !settings.enabled {
        return report;
    }

    if report.asset_count < settings.min_visual_assets {
        report.warnings.push(format!(
            "Only {} visual assets (minimum {})",
            report.asset_count, settings.min_visual_assets
        ));
    }
    if report.cumulative_drift_seconds > settings.max_sync_drift_sec {
        report.warnings.push(format!(
            "Narration drifted {:.2}s from the estimate (limit {:.2}s)",
            report.cumulative_drift_seconds, settings.max_sync_drift_sec
        ));
    }
    for warning in &report.warnings {
        warn!("{}", warning);
    }

    report
}
