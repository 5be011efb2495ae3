//! Ingest command implementation.

use crate::cli::{App, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(input: &str, settings: Settings) -> Result<()> {
    Output::info(&format!("Processing: {}", input));

    let app = App::new(settings)?;

    match app.load(input).await {
        Ok((_, item)) => {
            Output::success(&format!(
                "Indexed '{}' ({} chunks)",
                item.title(),
                item.index().len()
            ));
            Output::kv("Content id", item.id().as_str());
        }
        Err(e) => {
            Output::error(&format!("Failed to process: {}", e));
            if e.is_recoverable() {
                Output::info("Run 'earshot doctor' for detailed diagnostics.");
            }
            return Err(e.into());
        }
    }

    Ok(())
}
