//! Doctor command - verify system requirements and configuration.

use crate::cli::output::format_size;
use crate::cli::Output;
use crate::config::Settings;
use crate::research::FindingCache;
use console::style;
use std::path::PathBuf;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(config_path: Option<&PathBuf>, settings: &Settings) -> anyhow::Result<()> {
    Output::header("Reelsmith Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    section(&mut checks, "External Tools", vec![
        check_tool("ffmpeg", &["-version"], install_hint_ffmpeg()),
        check_tool("ffprobe", &["-version"], install_hint_ffmpeg()),
        check_tool(&settings.visuals.browser, &["--version"], install_hint_browser()),
    ]);

    section(
        &mut checks,
        "API Configuration",
        settings
            .required_env_vars()
            .into_iter()
            .map(check_env_var)
            .collect(),
    );

    section(&mut checks, "Directories", check_directories(settings));

    section(&mut checks, "Video", check_video(settings));

    section(&mut checks, "Configuration", vec![check_config_file(config_path)]);

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before generating videos.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Reelsmith is ready to use.");
    }

    Ok(())
}

fn section(checks: &mut Vec<CheckResult>, title: &str, results: Vec<CheckResult>) {
    println!("{}", style(title).bold());
    for check in &results {
        check.print();
    }
    println!();
    checks.extend(results);
}

/// Check if an external tool is available.
fn check_tool(name: &str, args: &[&str], hint: &str) -> CheckResult {
    match Command::new(name).args(args).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else {
                version
            };

            CheckResult::ok(name, &version_display)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check that one of the alternative variables is set.
fn check_env_var(alternatives: &[&str]) -> CheckResult {
    let name = alternatives.join(" | ");
    let found = alternatives
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()).map(|v| (*var, v)));

    match found {
        Some((var, value)) => CheckResult::ok(&name, &format!("{} set ({})", var, mask(&value))),
        None => CheckResult::error(
            &name,
            "not set",
            &format!("Set with: export {}='...'", alternatives.first().copied().unwrap_or_default()),
        ),
    }
}

fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 12 {
        "***".to_string()
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// Check output, cache and temp directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    for (name, dir) in [
        ("Output directory", settings.output_dir()),
        ("Temp directory", settings.temp_dir()),
    ] {
        if dir.exists() {
            results.push(CheckResult::ok(name, &dir.display().to_string()));
        } else {
            results.push(CheckResult::warning(
                name,
                &format!("{} (will be created)", dir.display()),
                "Directory will be created on first run",
            ));
        }
    }

    match FindingCache::new(&settings.cache_dir()).and_then(|cache| cache.stats()) {
        Ok(stats) => results.push(CheckResult::ok(
            "Research cache",
            &format!(
                "{} ({} searches, {} pages, {})",
                settings.cache_dir().display(),
                stats.search_entries,
                stats.page_entries,
                format_size(stats.total_bytes)
            ),
        )),
        Err(e) => results.push(CheckResult::error(
            "Research cache",
            &e.to_string(),
            "Check general.cache_dir in the config file",
        )),
    }

    results
}

/// Check the active style preset and the background music file.
fn check_video(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    match settings.video.active_style() {
        Ok(style) => results.push(CheckResult::ok(
            "Style",
            &format!(
                "{} ({}x{} @ {} fps)",
                settings.video.style, style.width, style.height, style.fps
            ),
        )),
        Err(e) => results.push(CheckResult::error(
            "Style",
            &e.to_string(),
            "Set video.style to one of the names under [video.styles]",
        )),
    }

    let music = &settings.video.background_music;
    if music.enabled {
        let path = Settings::expand_path(&music.path);
        if path.is_file() {
            results.push(CheckResult::ok("Background music", &path.display().to_string()));
        } else {
            results.push(CheckResult::warning(
                "Background music",
                &format!("{} not found, narration will play alone", path.display()),
                "Set video.background_music.path or disable background music",
            ));
        }
    }

    results
}

/// Check if config file exists.
fn check_config_file(config_path: Option<&PathBuf>) -> CheckResult {
    let path = config_path
        .cloned()
        .unwrap_or_else(Settings::default_config_path);
    if path.exists() {
        CheckResult::ok("Config file", &path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: reelsmith config init",
        )
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

/// Platform-specific install hint for the headless browser.
fn install_hint_browser() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install --cask chromium (or set visuals.browser)"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install chromium (or set visuals.browser)"
    } else {
        "Install Chromium and set visuals.browser to its path"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_missing_env_var_is_error() {
        let result = check_env_var(&["REELSMITH_DOCTOR_UNSET"]);
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.name, "REELSMITH_DOCTOR_UNSET");
    }

    #[test]
    fn test_video_checks() {
        let mut settings = Settings::default();
        let results = check_video(&settings);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, CheckStatus::Ok);
        assert!(results[0].message.contains("1920x1080"));

        settings.video.style = "neon".to_string();
        settings.video.background_music.enabled = true;
        settings.video.background_music.path = "/nonexistent/bed.mp3".to_string();
        let results = check_video(&settings);
        assert_eq!(results[0].status, CheckStatus::Error);
        assert_eq!(results[1].status, CheckStatus::Warning);
    }

    #[test]
    fn test_mask_hides_short_values() {
        assert_eq!(mask("short"), "***");
        assert_eq!(mask("sk-abcdefghijklmnop"), "sk-a...mnop");
    }

    #[test]
    fn test_missing_config_file_is_warning() {
        let path = PathBuf::from("/nonexistent/reelsmith/config.toml");
        assert_eq!(check_config_file(Some(&path)).status, CheckStatus::Warning);
    }
}
