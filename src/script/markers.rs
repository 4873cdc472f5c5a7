//! Inline visual cue parsing.

use super::{MarkerType, VisualMarker};
use regex::Regex;
use std::sync::LazyLock;

static CUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(SCREENSHOT|VISUAL):([^\]]*)\]").expect("Invalid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// A slice of narration: either spoken text or a cue span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Cue {
        raw: &'a str,
        marker_type: MarkerType,
        /// Trimmed cue payload.
        value: &'a str,
    },
}

impl<'a> Segment<'a> {
    /// The exact input text this segment covers.
    pub fn as_str(&self) -> &'a str {
        match self {
            Segment::Text(text) => text,
            Segment::Cue { raw, .. } => raw,
        }
    }
}

/// Split narration into text runs and cue spans, in order.
///
/// Concatenating `as_str()` of every segment gives back the input unchanged.
pub fn partition_cues(narration: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in CUE.captures_iter(narration) {
        let (Some(whole), Some(tag), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text(&narration[last..whole.start()]));
        }
        let marker_type = if tag.as_str() == "SCREENSHOT" {
            MarkerType::Screenshot
        } else {
            MarkerType::Visual
        };
        segments.push(Segment::Cue {
            raw: whole.as_str(),
            marker_type,
            value: value.as_str().trim(),
        });
        last = whole.end();
    }

    if last < narration.len() {
        segments.push(Segment::Text(&narration[last..]));
    }
    segments
}

/// Markers for every non-empty cue, in order of appearance.
pub fn extract_markers(narration: &str, section_id: &str) -> Vec<VisualMarker> {
    partition_cues(narration)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Cue { marker_type, value, .. } if !value.is_empty() => Some(match marker_type {
                MarkerType::Screenshot => VisualMarker::screenshot(value, section_id),
                MarkerType::Visual => VisualMarker::visual(value, section_id),
            }),
            _ => None,
        })
        .collect()
}

/// Narration with every cue span removed and whitespace collapsed.
pub fn clean_narration(narration: &str) -> String {
    let spoken: String = partition_cues(narration)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => text,
            Segment::Cue { .. } => " ",
        })
        .collect();
    WHITESPACE.replace_all(&spoken, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NARRATION: &str =
        "Intro text [SCREENSHOT: https://a.example/1] more text [VISUAL: chart of growth]";

    #[test]
    fn test_extract_in_order_of_appearance() {
        let text = "[VISUAL: logo] then [SCREENSHOT: https://b.example] and [VISUAL: diagram]";
        let markers = extract_markers(text, "intro");
        assert_eq!(
            markers,
            vec![
                VisualMarker::visual("logo", "intro"),
                VisualMarker::screenshot("https://b.example", "intro"),
                VisualMarker::visual("diagram", "intro"),
            ]
        );
    }

    #[test]
    fn test_clean_narration() {
        assert_eq!(clean_narration(NARRATION), "Intro text more text");
        assert_eq!(clean_narration("a[VISUAL: x]b"), "a b");
        assert_eq!(clean_narration("   "), "");
    }

    #[test]
    fn test_tags_are_case_sensitive() {
        let text = "see [screenshot: https://a.example] here";
        assert!(extract_markers(text, "s0").is_empty());
        assert_eq!(clean_narration(text), text);
    }

    #[test]
    fn test_empty_cue_is_stripped_without_marker() {
        let text = "before [VISUAL:   ] after";
        assert!(extract_markers(text, "s0").is_empty());
        assert_eq!(clean_narration(text), "before after");
    }

    #[test]
    fn test_partition_is_lossless() {
        let inputs = [
            NARRATION,
            "[SCREENSHOT: https://x.example]",
            "no cues at all",
            "a [VISUAL: one][VISUAL: two]  b [SCREENSHOT:https://c.example/p?q=1] ",
            "unterminated [VISUAL: oops",
            "",
        ];
        for input in inputs {
            let rebuilt: String = partition_cues(input).iter().map(Segment::as_str).collect();
            assert_eq!(rebuilt, input);
        }
    }

    #[test]
    fn test_reinserting_markers_restores_content() {
        let segments = partition_cues(NARRATION);
        let markers = extract_markers(NARRATION, "s0");

        let mut next = markers.iter();
        let rebuilt: String = segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.to_string(),
                Segment::Cue { .. } => {
                    let marker = next.next().unwrap();
                    format!("[{}: {}]", marker.marker_type.tag(), marker.value())
                }
            })
            .collect();
        assert_eq!(rebuilt, NARRATION);
    }
}
