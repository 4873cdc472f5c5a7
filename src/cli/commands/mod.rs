//! CLI command implementations.

mod cache;
mod config;
mod doctor;
mod generate;
mod research;
mod serve;

pub use cache::run_cache;
pub use config::run_config;
pub use doctor::run_doctor;
pub use generate::run_generate;
pub use research::run_research;
pub use serve::run_serve;
