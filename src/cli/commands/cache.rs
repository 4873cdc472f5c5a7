//! Cache command implementation.

use crate::cli::output::format_size;
use crate::cli::{CacheAction, Output};
use crate::config::Settings;
use crate::research::FindingCache;
use anyhow::Result;

/// Run the cache command.
pub fn run_cache(action: &CacheAction, settings: &Settings) -> Result<()> {
    let cache = FindingCache::new(&settings.cache_dir())?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            Output::header("Research cache");
            Output::kv("Location", &cache.root().display().to_string());
            Output::kv("Search results", &stats.search_entries.to_string());
            Output::kv("Pages", &stats.page_entries.to_string());
            Output::kv("Size", &format_size(stats.total_bytes));
        }

        CacheAction::Clear => {
            let removed = cache.clear()?;
            Output::success(&format!("Removed {} cached entries.", removed));
        }
    }

    Ok(())
}
