//! Research command - run only the research stage.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Pipeline;
use anyhow::Result;

/// Run the research command.
pub async fn run_research(topic: &str, json: bool, settings: Settings) -> Result<()> {
    preflight::check(Operation::Research, &settings)?;

    let pipeline = Pipeline::new(settings)?;

    let spinner = (!json).then(|| Output::spinner(&format!("Researching {}...", topic)));
    let result = pipeline.research(topic).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let result = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    Output::header(&format!("Research: {}", result.topic));
    Output::kv("Query", &result.query_used);
    Output::kv("Sources", &result.findings.len().to_string());

    if !result.structured_summary.is_empty() {
        println!();
        println!("{}", result.structured_summary);
    }

    if !result.key_facts.is_empty() {
        Output::header("Key facts");
        for fact in &result.key_facts {
            Output::list_item(fact);
        }
    }

    if !result.findings.is_empty() {
        Output::header("Findings");
        for finding in &result.findings {
            Output::finding(
                &finding.title,
                &finding.url,
                finding.relevance_score,
                finding.full_content.is_some(),
            );
        }
    }

    Ok(())
}
