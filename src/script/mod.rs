//! Narration scripts: visual cue parsing, estimated timing and LLM generation.
//!
//! A script is a sequence of sections whose narration carries inline cues such as
//! `[SCREENSHOT: https://example.com]` or `[VISUAL: bar chart of adoption]`. The
//! timing builder strips those cues into [`VisualMarker`]s and lays the sections
//! on an estimated timeline derived from a words-per-minute rate.

mod generator;
mod markers;
mod timing;

pub use generator::ScriptGenerator;
pub use markers::{clean_narration, extract_markers, partition_cues, Segment};
pub use timing::{build_script, estimate_duration};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of visual a cue asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerType {
    Screenshot,
    Visual,
}

impl MarkerType {
    /// The cue tag as written in narration.
    pub fn tag(&self) -> &'static str {
        match self {
            MarkerType::Screenshot => "SCREENSHOT",
            MarkerType::Visual => "VISUAL",
        }
    }
}

impl fmt::Display for MarkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerType::Screenshot => write!(f, "screenshot"),
            MarkerType::Visual => write!(f, "visual"),
        }
    }
}

/// A visual cue extracted from a section's narration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualMarker {
    pub marker_type: MarkerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub section_id: String,
}

impl VisualMarker {
    pub fn screenshot(url: impl Into<String>, section_id: impl Into<String>) -> Self {
        Self {
            marker_type: MarkerType::Screenshot,
            url: Some(url.into()),
            description: None,
            section_id: section_id.into(),
        }
    }

    pub fn visual(description: impl Into<String>, section_id: impl Into<String>) -> Self {
        Self {
            marker_type: MarkerType::Visual,
            url: None,
            description: Some(description.into()),
            section_id: section_id.into(),
        }
    }

    /// The url for screenshots, the description for visuals.
    pub fn value(&self) -> &str {
        match self.marker_type {
            MarkerType::Screenshot => self.url.as_deref().unwrap_or_default(),
            MarkerType::Visual => self.description.as_deref().unwrap_or_default(),
        }
    }
}

/// A section as returned by the script writer, before timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSection {
    pub section_id: Option<String>,
    #[serde(alias = "type")]
    pub section_type: Option<String>,
    pub title: Option<String>,
    pub narration_text: String,
}

/// A timed section with cue-free narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSection {
    pub section_id: String,
    pub section_type: String,
    pub title: String,
    pub narration_text: String,
    pub visual_markers: Vec<VisualMarker>,
    pub estimated_duration_seconds: f64,
    pub estimated_start_time: f64,
}

impl ScriptSection {
    pub fn word_count(&self) -> usize {
        self.narration_text.split_whitespace().count()
    }
}

/// A complete narration script on an estimated timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoScript {
    pub topic: String,
    pub title: String,
    pub sections: Vec<ScriptSection>,
    pub full_text: String,
    pub total_estimated_seconds: f64,
}

impl VideoScript {
    pub fn marker_count(&self) -> usize {
        self.sections.iter().map(|s| s.visual_markers.len()).sum()
    }

    /// All markers in timeline order.
    pub fn markers(&self) -> impl Iterator<Item = &VisualMarker> {
        self.sections.iter().flat_map(|s| s.visual_markers.iter())
    }
}
