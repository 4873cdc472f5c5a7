//! Final video assembly with ffmpeg.
//!
//! Narration chunks are concatenated into one audio track, optionally mixed
//! with looped background music. Timed assets become a slideshow: time before
//! the first asset shows the first asset, gaps keep the previous asset on
//! screen, and a run without assets gets a plain background frame. Slides are
//! joined with `xfade` transitions, or hard cuts through the concat demuxer.

use crate::config::{Settings, VideoSettings, VideoStyle};
use crate::error::{ReelsmithError, Result};
use crate::media::run_tool;
use crate::sync::TimedAsset;
use crate::voice::VoiceChunk;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Builds the output video.
#[async_trait]
pub trait VideoAssembler: Send + Sync {
    /// Render `<output_dir>/<stem>.mp4` and return its path. Intermediate files
    /// go to `work_dir`, which belongs to a single run.
    async fn assemble(
        &self,
        chunks: &[VoiceChunk],
        timed: &[TimedAsset],
        stem: &str,
        work_dir: &Path,
    ) -> Result<PathBuf>;
}

/// One still image held for `duration` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub path: PathBuf,
    pub duration: f64,
}

/// Cover `[0, total)` with slides built from `timed`, which must be sorted by start time.
pub fn plan_slides(timed: &[TimedAsset], total: f64) -> Vec<Slide> {
    let mut slides: Vec<Slide> = Vec::with_capacity(timed.len());
    for (i, asset) in timed.iter().enumerate() {
        let start = if i == 0 { 0.0 } else { asset.start_time };
        let end = timed.get(i + 1).map(|next| next.start_time).unwrap_or(total);
        let duration = end - start;
        if duration > 0.0 {
            slides.push(Slide {
                path: asset.asset_path.clone(),
                duration,
            });
        }
    }
    slides
}

/// Quote a path for an ffmpeg concat list. Relative entries would resolve
/// against the list file's directory, so paths are made absolute.
fn concat_entry(path: &Path) -> String {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file '{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

fn slide_list(slides: &[Slide]) -> String {
    let mut list = String::new();
    for slide in slides {
        list.push_str(&concat_entry(&slide.path));
        list.push('\n');
        list.push_str(&format!("duration {:.3}\n", slide.duration));
    }
    // The demuxer ignores the last duration unless the final file is repeated.
    if let Some(last) = slides.last() {
        list.push_str(&concat_entry(&last.path));
        list.push('\n');
    }
    list
}

/// Sanitised file stem for a video title.
pub fn safe_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();
    let stem: String = cleaned.split_whitespace().collect::<Vec<_>>().join("_").chars().take(80).collect();
    if stem.is_empty() {
        "video".to_string()
    } else {
        stem
    }
}

/// Slide durations with the transition overlap added, and the start offset of
/// each transition. Every slide but the last is extended by `transition` so
/// each `xfade` begins exactly when the next slide is due.
fn xfade_timeline(slides: &[Slide], transition: f64) -> (Vec<f64>, Vec<f64>) {
    let mut lengths = Vec::with_capacity(slides.len());
    let mut offsets = Vec::with_capacity(slides.len().saturating_sub(1));
    let mut clock = 0.0;
    for (i, slide) in slides.iter().enumerate() {
        if i + 1 < slides.len() {
            lengths.push(slide.duration + transition);
            clock += slide.duration;
            offsets.push(clock);
        } else {
            lengths.push(slide.duration);
        }
    }
    (lengths, offsets)
}

/// Transition length that fits every slide: at most half the shortest one.
fn fitted_transition(slides: &[Slide], wanted: f64) -> f64 {
    let shortest = slides.iter().map(|s| s.duration).fold(f64::INFINITY, f64::min);
    wanted.min(shortest / 2.0).max(0.0)
}

/// ffmpeg arguments mixing `music`, looped and attenuated, under `narration`.
fn music_mix_args(narration: &Path, music: &Path, volume: f64, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        narration.as_os_str().to_os_string(),
        "-stream_loop".into(),
        "-1".into(),
        "-i".into(),
        music.as_os_str().to_os_string(),
        "-filter_complex".into(),
        format!(
            "[1:a]volume={:.3}[bg];[0:a][bg]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]",
            volume
        )
        .into(),
        "-map".into(),
        "[aout]".into(),
        "-codec:a".into(),
        "libmp3lame".into(),
        "-qscale:a".into(),
        "2".into(),
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        output.as_os_str().to_os_string(),
    ]
}

/// ffmpeg-based assembler.
pub struct FfmpegAssembler {
    video: VideoSettings,
    style: VideoStyle,
    output_dir: PathBuf,
}

impl FfmpegAssembler {
    pub fn new(video: VideoSettings, output_dir: PathBuf) -> Result<Self> {
        let style = video.active_style()?.clone();
        Ok(Self {
            video,
            style,
            output_dir,
        })
    }

    async fn concat_audio(&self, chunks: &[VoiceChunk], work_dir: &Path) -> Result<PathBuf> {
        let list: String = chunks
            .iter()
            .filter(|c| c.duration_seconds > 0.0)
            .map(|c| concat_entry(&c.audio_path) + "\n")
            .collect();
        if list.is_empty() {
            return Err(ReelsmithError::Assembly("No narration audio to assemble".to_string()));
        }

        let list_path = work_dir.join("audio.txt");
        tokio::fs::write(&list_path, list).await?;
        let narration = work_dir.join("narration.mp3");

        let args: Vec<OsString> = vec![
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            list_path.into_os_string(),
            "-codec:a".into(),
            "libmp3lame".into(),
            "-qscale:a".into(),
            "2".into(),
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            narration.clone().into_os_string(),
        ];
        run_tool("ffmpeg", args).await?;
        Ok(narration)
    }

    /// Narration with background music underneath, or the narration unchanged
    /// when music is disabled or its file is missing.
    async fn mix_music(&self, narration: PathBuf, work_dir: &Path) -> Result<PathBuf> {
        let music = &self.video.background_music;
        if !music.enabled {
            return Ok(narration);
        }
        let music_path = Settings::expand_path(&music.path);
        if music.path.trim().is_empty() || !music_path.is_file() {
            warn!("Background music '{}' not found, skipping", music.path);
            return Ok(narration);
        }

        let mixed = work_dir.join("narration_music.mp3");
        run_tool("ffmpeg", music_mix_args(&narration, &music_path, music.volume, &mixed)).await?;
        Ok(mixed)
    }

    async fn background_frame(&self, work_dir: &Path) -> Result<PathBuf> {
        let frame = work_dir.join("background.png");
        let args: Vec<OsString> = vec![
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            format!(
                "color=c={}:s={}x{}",
                self.style.background_color, self.style.width, self.style.height
            )
            .into(),
            "-frames:v".into(),
            "1".into(),
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            frame.clone().into_os_string(),
        ];
        run_tool("ffmpeg", args).await?;
        Ok(frame)
    }

    fn video_filter(&self) -> String {
        let (w, h) = (self.style.width, self.style.height);
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color={},setsar=1,fps={},format=yuv420p",
            self.style.background_color, self.style.fps
        )
    }

    /// Filter graph normalising every slide and chaining them with `xfade`.
    fn xfade_graph(&self, slides: &[Slide], transition: f64) -> String {
        let (_, offsets) = xfade_timeline(slides, transition);
        let filter = self.video_filter();

        let mut graph: Vec<String> = (0..slides.len())
            .map(|i| format!("[{i}:v]{filter},settb=AVTB[v{i}]"))
            .collect();
        let mut previous = "v0".to_string();
        for (k, offset) in offsets.iter().enumerate() {
            let label = format!("x{}", k + 1);
            graph.push(format!(
                "[{previous}][v{}]xfade=transition={}:duration={:.3}:offset={:.3}[{label}]",
                k + 1,
                self.video.transitions.kind,
                transition,
                offset
            ));
            previous = label;
        }
        graph.push(format!("[{previous}]null[vout]"));
        graph.join(";")
    }

    fn encode_args(&self, output: &Path) -> Vec<OsString> {
        vec![
            "-c:v".into(),
            self.video.video_codec.clone().into(),
            "-preset".into(),
            self.video.preset.clone().into(),
            "-c:a".into(),
            self.video.audio_codec.clone().into(),
            "-b:a".into(),
            self.video.audio_bitrate.clone().into(),
            "-shortest".into(),
            "-movflags".into(),
            "+faststart".into(),
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            output.as_os_str().to_os_string(),
        ]
    }

    /// Hard cuts through the concat demuxer.
    fn concat_render_args(&self, slides_list: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            slides_list.as_os_str().to_os_string(),
            "-i".into(),
            audio.as_os_str().to_os_string(),
            "-vf".into(),
            self.video_filter().into(),
        ];
        args.extend(self.encode_args(output));
        args
    }

    /// One looped input per slide, joined by the `xfade` graph.
    fn xfade_render_args(&self, slides: &[Slide], transition: f64, audio: &Path, output: &Path) -> Vec<OsString> {
        let (lengths, _) = xfade_timeline(slides, transition);
        let mut args: Vec<OsString> = Vec::new();
        for (slide, length) in slides.iter().zip(&lengths) {
            args.extend([
                OsString::from("-loop"),
                "1".into(),
                "-t".into(),
                format!("{:.3}", length).into(),
                "-i".into(),
                std::path::absolute(&slide.path)
                    .unwrap_or_else(|_| slide.path.clone())
                    .into_os_string(),
            ]);
        }
        args.extend([
            OsString::from("-i"),
            audio.as_os_str().to_os_string(),
            "-filter_complex".into(),
            self.xfade_graph(slides, transition).into(),
            "-map".into(),
            "[vout]".into(),
            "-map".into(),
            format!("{}:a", slides.len()).into(),
        ]);
        args.extend(self.encode_args(output));
        args
    }
}

#[async_trait]
impl VideoAssembler for FfmpegAssembler {
    #[instrument(skip(self, chunks, timed, work_dir))]
    async fn assemble(
        &self,
        chunks: &[VoiceChunk],
        timed: &[TimedAsset],
        stem: &str,
        work_dir: &Path,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(work_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let total: f64 = chunks.iter().map(|c| c.duration_seconds).sum();
        let narration = self.concat_audio(chunks, work_dir).await?;
        let audio = self.mix_music(narration, work_dir).await?;

        let mut slides = plan_slides(timed, total);
        if slides.is_empty() {
            slides.push(Slide {
                path: self.background_frame(work_dir).await?,
                duration: total,
            });
        }

        let output = self.output_dir.join(format!("{}.mp4", stem));
        let transition = fitted_transition(&slides, self.video.transitions.duration);
        let args = if self.video.transitions.is_enabled() && slides.len() > 1 && transition > 0.0 {
            self.xfade_render_args(&slides, transition, &audio, &output)
        } else {
            let slides_path = work_dir.join("slides.txt");
            tokio::fs::write(&slides_path, slide_list(&slides)).await?;
            self.concat_render_args(&slides_path, &audio, &output)
        };
        run_tool("ffmpeg", args)
            .await
            .map_err(|e| ReelsmithError::Assembly(e.to_string()))?;

        info!("Rendered {} ({:.1}s, {} slides)", output.display(), total, slides.len());
        Ok(output)
    }
}
