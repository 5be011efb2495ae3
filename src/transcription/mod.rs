//! Transcription module for Earshot.
//!
//! Turns local media files into timed transcripts.

mod models;
mod whisper;

pub use models::{format_timestamp, Transcript, TranscriptSegment};
pub use whisper::WhisperCliTranscriber;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a media file and return segments with timestamps.
    async fn transcribe(&self, media_path: &Path) -> Result<Transcript>;
}
