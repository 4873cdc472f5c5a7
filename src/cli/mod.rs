//! CLI module for Reelsmith.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reelsmith - topic to narrated video
///
/// Researches a topic on the web, writes a narration script with visual cues,
/// synthesises the voice-over and assembles a synchronized video.
#[derive(Parser, Debug)]
#[command(name = "reelsmith")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override a configuration value (e.g. --set llm.provider=openai)
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub overrides: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a topic and produce a narrated video
    Generate {
        /// Topic to make a video about
        #[arg(short, long, conflicts_with = "topic_file", required_unless_present = "topic_file")]
        topic: Option<String>,

        /// JSON file with a topic and per-topic config overrides
        #[arg(long)]
        topic_file: Option<PathBuf>,
    },

    /// Run only the research stage and print the findings
    Research {
        /// Topic to research
        topic: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Check external tools, API keys and directories
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect or clear the research cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Write the effective configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cached entry counts and size
    Stats,

    /// Delete every cached search result and page
    Clear,
}
