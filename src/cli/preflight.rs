//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools are available before starting a load that
//! would otherwise fail midway through acquisition or transcription.

use crate::config::Settings;
use crate::content::SourceKind;
use crate::error::{EarshotError, Result};
use crate::tool;

/// External programs needed to load content of the given kind.
pub fn required_tools(kind: SourceKind, settings: &Settings) -> Vec<&str> {
    let mut tools = match kind {
        SourceKind::YouTube => vec![settings.acquisition.ytdlp_binary.as_str()],
        SourceKind::Local => vec![settings.acquisition.ffprobe_binary.as_str()],
    };
    tools.push(settings.transcription.binary.as_str());
    tools
}

/// Check that every tool needed to load `kind` content is on the PATH.
pub async fn check(kind: SourceKind, settings: &Settings) -> Result<()> {
    for name in required_tools(kind, settings) {
        if !tool::is_available(name).await {
            return Err(EarshotError::ToolNotFound(name.to_string()));
        }
    }
    Ok(())
}
