//! Reelsmith - topic to narrated video
//!
//! A CLI tool and library that researches a topic on the web, writes a
//! narration script with embedded visual cues, synthesises the voice-over and
//! assembles a video whose visuals change in step with the narration.
//!
//! # Architecture
//!
//! - `research` - query generation, cached search and page fetching, fact extraction
//! - `script` - script generation, cue extraction and timing estimates
//! - `voice` - text-to-speech providers and concurrent narration
//! - `visuals` - screenshots and title cards for each cue
//! - `sync` - timing windows for visuals and quality checks
//! - `assembly` - ffmpeg video assembly
//! - `metadata` - upload title, description and tags
//! - `orchestrator` - pipeline coordination
//! - `llm`, `search` - provider adapters
//! - `config` - settings, overrides and prompt templates
//!
//! # Example
//!
//! ```rust,no_run
//! use reelsmith::config::Settings;
//! use reelsmith::orchestrator::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(settings)?;
//!
//!     let result = pipeline.run("The Rust 2024 edition").await;
//!     match result.video_path {
//!         Some(path) => println!("Video written to {}", path.display()),
//!         None => eprintln!("Failed: {:?}", result.error_message),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod assembly;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod media;
pub mod metadata;
pub mod openai;
pub mod orchestrator;
pub mod research;
pub mod script;
pub mod search;
pub mod sync;
pub mod visuals;
pub mod voice;

pub use error::{ReelsmithError, Result};
