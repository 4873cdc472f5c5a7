//! Visual asset collection for script markers.

mod collectors;

pub use collectors::{BrowserScreenshots, RoutingCollector, TitleCards};

use crate::script::{MarkerType, VideoScript, VisualMarker};
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const MAX_CONCURRENT_CAPTURES: usize = 4;

/// An image produced for a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedAsset {
    pub marker: VisualMarker,
    pub path: PathBuf,
}

/// Produces an image for a marker.
#[async_trait]
pub trait VisualCollector: Send + Sync {
    /// Capture `marker` into `output_path`. `Ok(None)` means this collector does not
    /// handle the marker.
    async fn collect(&self, marker: &VisualMarker, output_path: &Path) -> Result<Option<CapturedAsset>>;
}

/// Collects assets for every marker of a script.
pub struct VisualService {
    collector: Arc<dyn VisualCollector>,
}

impl VisualService {
    pub fn new(collector: Arc<dyn VisualCollector>) -> Self {
        Self { collector }
    }

    /// Captured assets in marker order. Failed captures are logged and skipped.
    #[instrument(skip(self, script, output_dir))]
    pub async fn collect_all(&self, script: &VideoScript, output_dir: &Path) -> Result<Vec<CapturedAsset>> {
        tokio::fs::create_dir_all(output_dir).await?;

        let jobs: Vec<(PathBuf, VisualMarker)> = script
            .sections
            .iter()
            .enumerate()
            .flat_map(|(si, section)| {
                section.visual_markers.iter().enumerate().map(move |(mi, marker)| {
                    let kind = match marker.marker_type {
                        MarkerType::Screenshot => "shot",
                        MarkerType::Visual => "card",
                    };
                    (output_dir.join(format!("{:02}_{:02}_{}.png", si, mi, kind)), marker.clone())
                })
            })
            .collect();
        let total = jobs.len();

        let outcomes: Vec<Result<Option<CapturedAsset>>> = stream::iter(jobs)
            .map(|(path, marker)| {
                let collector = Arc::clone(&self.collector);
                async move { collector.collect(&marker, &path).await }
            })
            .buffered(MAX_CONCURRENT_CAPTURES)
            .collect()
            .await;

        let mut assets = Vec::with_capacity(total);
        for outcome in outcomes {
            match outcome {
                Ok(Some(asset)) => assets.push(asset),
                Ok(None) => {}
                Err(e) => warn!("Visual capture failed: {}", e),
            }
        }

        info!("Collected {}/{} visual assets", assets.len(), total);
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReelsmithError;
    use crate::script::{build_script, RawSection};

    struct OnlyVisuals;

    #[async_trait]
    impl VisualCollector for OnlyVisuals {
        async fn collect(&self, marker: &VisualMarker, output_path: &Path) -> Result<Option<CapturedAsset>> {
            match marker.marker_type {
                MarkerType::Visual if marker.value() == "broken" => {
                    Err(ReelsmithError::Visual("renderer crashed".into()))
                }
                MarkerType::Visual => Ok(Some(CapturedAsset {
                    marker: marker.clone(),
                    path: output_path.to_path_buf(),
                })),
                MarkerType::Screenshot => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn test_collect_all_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let script = build_script(
            "t",
            None,
            vec![
                RawSection {
                    narration_text: "a [VISUAL: one] b [SCREENSHOT: https://x.example]".into(),
                    ..RawSection::default()
                },
                RawSection {
                    narration_text: "c [VISUAL: broken] d [VISUAL: two]".into(),
                    ..RawSection::default()
                },
            ],
            150,
        )
        .unwrap();

        let service = VisualService::new(Arc::new(OnlyVisuals));
        let assets = service.collect_all(&script, dir.path()).await.unwrap();

        let values: Vec<&str> = assets.iter().map(|a| a.marker.value()).collect();
        assert_eq!(values, vec!["one", "two"]);
        assert!(assets[1].path.ends_with("01_01_card.png"));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_collect_all_future_is_send() {
        let script = build_script("t", None, Vec::new(), 150).unwrap();
        let service = VisualService::new(Arc::new(OnlyVisuals));
        let dir = PathBuf::from("unused");
        assert_send(&service.collect_all(&script, &dir));
    }
}
