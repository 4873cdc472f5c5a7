//! ffmpeg and ffprobe helpers shared by voice, visuals and assembly.

use crate::error::{ReelsmithError, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Run an external tool to completion, mapping a missing binary to `ToolNotFound`
/// and a non-zero exit to `ToolFailed` with its stderr.
pub async fn run_tool<I, S>(program: &str, args: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let result = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ReelsmithError::ToolNotFound(program.into()));
        }
        Err(e) => {
            return Err(ReelsmithError::ToolFailed(format!("{program} execution failed: {e}")));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(5)..].join("\n");
        return Err(ReelsmithError::ToolFailed(format!("{program} failed: {tail}")));
    }

    Ok(output.stdout)
}

/// Query the duration of a media file using ffprobe with JSON output.
pub async fn media_duration(path: &Path) -> Result<f64> {
    let stdout = run_tool(
        "ffprobe",
        [
            OsStr::new("-v"),
            OsStr::new("quiet"),
            OsStr::new("-print_format"),
            OsStr::new("json"),
            OsStr::new("-show_format"),
            path.as_os_str(),
        ],
    )
    .await?;

    let duration = parse_ffprobe_output(&String::from_utf8_lossy(&stdout))?;
    debug!("{} lasts {:.2}s", path.display(), duration);
    Ok(duration)
}

fn parse_ffprobe_output(json: &str) -> Result<f64> {
    let parsed: serde_json::Value = serde_json::from_str(json)
        .map_err(|_| ReelsmithError::ToolFailed("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| ReelsmithError::ToolFailed("Could not determine media duration".into()))
}

/// Write `seconds` of silence as MP3.
pub async fn write_silence(path: &Path, seconds: f64) -> Result<()> {
    let duration = format!("{:.3}", seconds.max(0.0));
    run_tool(
        "ffmpeg",
        [
            OsStr::new("-f"),
            OsStr::new("lavfi"),
            OsStr::new("-i"),
            OsStr::new("anullsrc=r=44100:cl=mono"),
            OsStr::new("-t"),
            OsStr::new(&duration),
            OsStr::new("-codec:a"),
            OsStr::new("libmp3lame"),
            OsStr::new("-y"),
            OsStr::new("-loglevel"),
            OsStr::new("error"),
            path.as_os_str(),
        ],
    )
    .await?;
    Ok(())
}

/// Escape text for a quoted ffmpeg filter argument such as `drawtext=text='...'`.
/// A straight apostrophe would close the quote, so it becomes a typographic one.
pub fn escape_filter_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\'' => escaped.push('\u{2019}'),
            '\\' | ':' | '%' | ',' | ';' | '[' | ']' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}
