//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and API keys are available before starting a
//! run that would otherwise fail midway, after paid API calls were already made.

use crate::config::Settings;
use crate::error::{ReelsmithError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Full generation needs every provider key, ffmpeg, ffprobe and the browser.
    Generate,
    /// Research needs the LLM and search keys only.
    Research,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Generate => {
            check_env(&settings.required_env_vars())?;
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
            check_tool(&settings.visuals.browser)?;
        }
        Operation::Research => check_env(&settings.research_env_vars())?,
    }
    Ok(())
}

/// Every entry needs at least one of its alternatives set.
fn check_env(vars: &[&[&str]]) -> Result<()> {
    let missing: Vec<String> = vars
        .iter()
        .filter(|alternatives| {
            !alternatives
                .iter()
                .any(|var| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
        })
        .map(|alternatives| alternatives.join(" or "))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReelsmithError::Config(format!(
            "Missing environment variables: {}",
            missing.join(", ")
        )))
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    // ffmpeg/ffprobe use -version (single dash), others use --version
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(ReelsmithError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ReelsmithError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(ReelsmithError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_env_reports_missing_alternatives() {
        let err = check_env(&[&["REELSMITH_TEST_UNSET_A", "REELSMITH_TEST_UNSET_B"]]).unwrap_err();
        assert!(err
            .to_string()
            .contains("REELSMITH_TEST_UNSET_A or REELSMITH_TEST_UNSET_B"));
        tokio_test::assert_ok!(check_env(&[]));
    }

    #[test]
    fn test_searx_research_needs_only_llm_key() {
        let mut settings = Settings::default();
        settings.search.provider = crate::config::SearchProviderKind::Searx;
        assert_eq!(settings.research_env_vars().len(), 1);
        assert!(settings.required_env_vars().len() > 1);
        tokio_test::assert_ok!(check_env(&[&["REELSMITH_TEST_UNSET", "PATH"]]));
    }

    #[test]
    fn test_missing_tool() {
        assert!(matches!(
            check_tool("reelsmith-no-such-browser"),
            Err(ReelsmithError::ToolNotFound(_))
        ));
    }
}
