//! Forget command implementation.

use crate::cache::create_cache;
use crate::cli::Output;
use crate::config::Settings;
use crate::content::ContentId;
use anyhow::Result;

/// Run the forget command.
pub async fn run_forget(content_id: &str, settings: Settings) -> Result<()> {
    let cache = create_cache(&settings)?;

    if cache.remove(&ContentId::new(content_id))? {
        Output::success(&format!("Removed {} from the cache.", content_id));
    } else {
        Output::warning(&format!("{} is not cached.", content_id));
    }

    Ok(())
}
