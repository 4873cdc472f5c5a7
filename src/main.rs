//! Reelsmith CLI entry point.

use anyhow::Result;
use clap::Parser;
use reelsmith::cli::{commands, Cli, Commands};
use reelsmith::config::{parse_override, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("reelsmith={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let overrides = cli
        .overrides
        .iter()
        .map(|item| parse_override(item))
        .collect::<reelsmith::Result<Vec<_>>>()?;
    let settings = Settings::load_with_overrides(cli.config.as_ref(), &overrides)?;

    // Ensure working directories exist
    std::fs::create_dir_all(settings.output_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Generate { topic, topic_file } => {
            commands::run_generate(
                topic.clone(),
                topic_file.clone(),
                cli.config.as_ref(),
                &overrides,
                settings,
            )
            .await?;
        }

        Commands::Research { topic, json } => {
            commands::run_research(topic, *json, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, cli.config.clone(), overrides, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(cli.config.as_ref(), &settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, cli.config.as_ref(), settings)?;
        }

        Commands::Cache { action } => {
            commands::run_cache(action, &settings)?;
        }
    }

    Ok(())
}
