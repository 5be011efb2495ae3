//! List command implementation.

use crate::cache::create_cache;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let cache = create_cache(&settings)?;

    match cache.list() {
        Ok(items) => {
            if items.is_empty() {
                Output::info("Nothing cached yet. Use 'earshot ingest <input>' to add content.");
            } else {
                Output::header(&format!("Cached Content ({})", items.len()));
                println!();

                for item in &items {
                    Output::cached_item(
                        &item.title,
                        item.source.id.as_str(),
                        item.chunk_count,
                        item.duration_seconds,
                    );
                }

                let total_chunks: usize = items.iter().filter_map(|i| i.chunk_count).sum();
                println!();
                Output::kv("Total items", &items.len().to_string());
                Output::kv("Total chunks", &total_chunks.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list cache: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
