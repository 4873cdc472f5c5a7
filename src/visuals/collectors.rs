//! Screenshot and title-card collectors.

use super::{CapturedAsset, VisualCollector};
use crate::config::{VideoStyle, VisualSettings};
use crate::error::{ReelsmithError, Result};
use crate::media::{escape_filter_text, run_tool};
use crate::script::{MarkerType, VisualMarker};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Full-page screenshots of `SCREENSHOT` markers via a headless Chromium.
pub struct BrowserScreenshots {
    browser: String,
    timeout: Duration,
    width: u32,
    height: u32,
}

impl BrowserScreenshots {
    pub fn new(visuals: &VisualSettings, style: &VideoStyle) -> Self {
        Self {
            browser: visuals.browser.clone(),
            timeout: Duration::from_secs(visuals.timeout_secs),
            width: style.width,
            height: style.height,
        }
    }

    fn args(&self, url: &str, output_path: &Path) -> Vec<OsString> {
        let mut screenshot = OsString::from("--screenshot=");
        screenshot.push(output_path.as_os_str());
        vec![
            "--headless".into(),
            "--disable-gpu".into(),
            "--hide-scrollbars".into(),
            "--no-sandbox".into(),
            format!("--window-size={},{}", self.width, self.height).into(),
            screenshot,
            url.into(),
        ]
    }
}

#[async_trait]
impl VisualCollector for BrowserScreenshots {
    #[instrument(skip(self, output_path), fields(url = marker.value()))]
    async fn collect(&self, marker: &VisualMarker, output_path: &Path) -> Result<Option<CapturedAsset>> {
        if marker.marker_type != MarkerType::Screenshot {
            return Ok(None);
        }

        let url = url::Url::parse(marker.value())
            .map_err(|e| ReelsmithError::Visual(format!("Invalid screenshot url '{}': {}", marker.value(), e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ReelsmithError::Visual(format!("Refusing to screenshot '{}'", url)));
        }

        tokio::time::timeout(self.timeout, run_tool(&self.browser, self.args(url.as_str(), output_path)))
            .await
            .map_err(|_| ReelsmithError::Visual(format!("Screenshot of {} timed out", url)))??;

        if !output_path.exists() {
            return Err(ReelsmithError::Visual(format!("{} produced no screenshot for {}", self.browser, url)));
        }
        debug!("Captured {}", output_path.display());

        Ok(Some(CapturedAsset {
            marker: marker.clone(),
            path: output_path.to_path_buf(),
        }))
    }
}

/// Text cards rendered with ffmpeg `drawtext` for `VISUAL` markers.
pub struct TitleCards {
    width: u32,
    height: u32,
    background: String,
    font_size: u32,
    text_color: String,
}

impl TitleCards {
    pub fn new(style: &VideoStyle) -> Self {
        Self {
            width: style.width,
            height: style.height,
            background: style.background_color.clone(),
            font_size: style.font_size,
            text_color: style.text_color.clone(),
        }
    }

    fn args(&self, text: &str, output_path: &Path) -> Vec<OsString> {
        let filter = format!(
            "drawtext=text='{}':fontcolor={}:fontsize={}:x=(w-text_w)/2:y=(h-text_h)/2",
            escape_filter_text(text),
            self.text_color,
            self.font_size
        );
        vec![
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            format!("color=c={}:s={}x{}", self.background, self.width, self.height).into(),
            "-vf".into(),
            filter.into(),
            "-frames:v".into(),
            "1".into(),
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            output_path.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl VisualCollector for TitleCards {
    async fn collect(&self, marker: &VisualMarker, output_path: &Path) -> Result<Option<CapturedAsset>> {
        if marker.marker_type != MarkerType::Visual {
            return Ok(None);
        }

        run_tool("ffmpeg", self.args(marker.value(), output_path)).await?;

        Ok(Some(CapturedAsset {
            marker: marker.clone(),
            path: output_path.to_path_buf(),
        }))
    }
}

/// Sends each marker type to its own collector.
pub struct RoutingCollector {
    screenshots: Arc<dyn VisualCollector>,
    visuals: Arc<dyn VisualCollector>,
}

impl RoutingCollector {
    pub fn new(screenshots: Arc<dyn VisualCollector>, visuals: Arc<dyn VisualCollector>) -> Self {
        Self { screenshots, visuals }
    }

    /// Chromium for screenshots and ffmpeg cards for visuals.
    pub fn from_settings(visuals: &VisualSettings, style: &VideoStyle) -> Self {
        Self::new(
            Arc::new(BrowserScreenshots::new(visuals, style)),
            Arc::new(TitleCards::new(style)),
        )
    }
}

#[async_trait]
impl VisualCollector for RoutingCollector {
    async fn collect(&self, marker: &VisualMarker, output_path: &Path) -> Result<Option<CapturedAsset>> {
        match marker.marker_type {
            MarkerType::Screenshot => self.screenshots.collect(marker, output_path).await,
            MarkerType::Visual => self.visuals.collect(marker, output_path).await,
        }
    }
}
