//! Error types for Earshot.

use std::sync::Arc;
use thiserror::Error;

/// Library-level error type for Earshot operations.
#[derive(Error, Debug)]
pub enum EarshotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Acquisition failed for {content_id}: {source}")]
    Acquisition {
        content_id: String,
        #[source]
        source: Box<EarshotError>,
    },

    #[error("Transcription failed for {content_id}: {source}")]
    Transcription {
        content_id: String,
        #[source]
        source: Box<EarshotError>,
    },

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// The transcript was committed to the cache but no index could be built.
    #[error("Transcript for {content_id} is cached but indexing failed: {source}")]
    IndexingIncomplete {
        content_id: String,
        #[source]
        source: Box<EarshotError>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Generation backend unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Generation timed out after {0} seconds")]
    GenerationTimeout(u64),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Content {0} is not loaded")]
    NotLoaded(String),

    #[error("Acquisition of {0} was cancelled")]
    Cancelled(String),

    #[error("Media source error: {0}")]
    Source(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    /// A failure observed by every caller waiting on the same in-flight acquisition.
    #[error(transparent)]
    Shared(Arc<EarshotError>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl EarshotError {
    /// Unwrap a shared failure when this is the last reference to it.
    pub fn from_shared(err: Arc<EarshotError>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(EarshotError::Shared)
    }

    /// The innermost non-shared error.
    pub fn root(&self) -> &EarshotError {
        match self {
            EarshotError::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Whether retrying the same operation can reasonably succeed.
    ///
    /// Configuration errors and invalid arguments are caller bugs; everything
    /// that depends on a collaborator or the environment is recoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.root(),
            EarshotError::Config(_) | EarshotError::InvalidArgument(_)
        )
    }
}

/// Result type alias for Earshot operations.
pub type Result<T> = std::result::Result<T, EarshotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_error_unwraps_when_unique() {
        let err = EarshotError::from_shared(Arc::new(EarshotError::Embedding("down".into())));
        assert!(matches!(err, EarshotError::Embedding(_)));
    }

    #[test]
    fn test_shared_error_keeps_cause_when_aliased() {
        let shared = Arc::new(EarshotError::InvalidArgument("k".into()));
        let _other = shared.clone();
        let err = EarshotError::from_shared(shared);
        assert!(matches!(err, EarshotError::Shared(_)));
        assert!(matches!(err.root(), EarshotError::InvalidArgument(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_stage_errors_keep_content_id() {
        let err = EarshotError::Acquisition {
            content_id: "abc".into(),
            source: Box::new(EarshotError::ToolNotFound("yt-dlp".into())),
        };
        let message = err.to_string();
        assert!(message.contains("abc"));
        assert!(message.contains("yt-dlp"));
        assert!(err.is_recoverable());
    }
}
