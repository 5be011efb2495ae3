//! Search command implementation.

use crate::cli::{App, Output};
use crate::config::Settings;
use crate::rag::SourceCitation;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(input: &str, query: &str, limit: usize, settings: Settings) -> Result<()> {
    let app = App::new(settings)?;
    let (source, _) = app.load(input).await?;

    let spinner = Output::spinner("Searching...");
    let results = app.registry().search(&source.id, query, limit).await;
    spinner.finish_and_clear();

    match results {
        Ok(chunks) => {
            if chunks.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", chunks.len()));

                for (i, scored) in chunks.iter().enumerate() {
                    let citation = SourceCitation::new(i + 1, scored);
                    Output::excerpt(
                        citation.rank,
                        citation.timestamp.as_deref(),
                        citation.score,
                        &scored.chunk.text,
                        citation.url.as_deref(),
                    );
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
