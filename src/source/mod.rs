//! Media sources for Earshot.
//!
//! Resolves user input (YouTube URLs or ids, local media paths) into a
//! [`SourceRef`] and fetches the media behind it.

mod local;
mod youtube;

pub use local::{is_media_file, local_content_id};
pub use youtube::{extract_video_id, watch_url};

use crate::config::AcquisitionSettings;
use crate::content::{ContentId, SourceKind, SourceRef};
use crate::error::{EarshotError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Metadata about an acquired media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Title.
    pub title: String,
    /// Duration in seconds (if known).
    pub duration_seconds: Option<f64>,
    /// Channel or author name (if available).
    pub channel: Option<String>,
}

/// Media ready for transcription.
#[derive(Debug, Clone)]
pub struct AcquiredMedia {
    pub metadata: MediaMetadata,
    /// Local audio or video file to transcribe.
    pub media_path: PathBuf,
}

/// Trait for fetching the media behind a source reference.
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    /// Fetch media for `source`, writing any downloads into `work_dir`.
    async fn acquire(&self, source: &SourceRef, work_dir: &Path) -> Result<AcquiredMedia>;
}

/// Parse user input into a source reference.
///
/// YouTube URLs and bare video ids use the video id as content id. Existing
/// local media files get an id derived from their canonical path.
pub fn parse_input(input: &str) -> Result<SourceRef> {
    let input = input.trim();

    if let Some(video_id) = extract_video_id(input) {
        return Ok(SourceRef::new(
            ContentId::new(&video_id),
            SourceKind::YouTube,
            watch_url(&video_id),
        ));
    }

    let path = Path::new(input);
    if path.is_file() {
        if !is_media_file(path) {
            return Err(EarshotError::InvalidArgument(format!(
                "Not a recognized audio or video file: {}",
                input
            )));
        }
        let canonical = path.canonicalize()?;
        return Ok(SourceRef::new(
            local_content_id(&canonical),
            SourceKind::Local,
            canonical.to_string_lossy(),
        ));
    }

    Err(EarshotError::InvalidArgument(format!(
        "Not a YouTube URL, video id, or media file: {}",
        input
    )))
}

/// Reject media longer than `max_seconds`.
pub fn check_duration(source: &SourceRef, duration_seconds: Option<f64>, max_seconds: u32) -> Result<()> {
    match duration_seconds {
        Some(duration) if duration > max_seconds as f64 => Err(EarshotError::Source(format!(
            "{} is too long ({} minutes); the limit is {} minutes",
            source.id,
            (duration / 60.0).round() as u64,
            max_seconds / 60
        ))),
        _ => Ok(()),
    }
}

/// Acquirer backed by `yt-dlp` for YouTube and `ffprobe` for local files.
pub struct ToolAcquirer {
    settings: AcquisitionSettings,
}

impl ToolAcquirer {
    pub fn new(settings: AcquisitionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }
}

#[async_trait]
impl MediaAcquirer for ToolAcquirer {
    #[instrument(skip(self, work_dir), fields(content_id = %source.id))]
    async fn acquire(&self, source: &SourceRef, work_dir: &Path) -> Result<AcquiredMedia> {
        match source.kind {
            SourceKind::YouTube => {
                let binary = &self.settings.ytdlp_binary;
                let metadata = youtube::fetch_metadata(binary, &source.locator).await?;
                check_duration(source, metadata.duration_seconds, self.settings.max_duration_seconds)?;

                info!("Downloading audio for \"{}\"", metadata.title);
                let media_path =
                    youtube::download_audio(binary, &source.locator, source.id.as_str(), work_dir).await?;

                Ok(AcquiredMedia {
                    metadata,
                    media_path,
                })
            }
            SourceKind::Local => {
                let path = PathBuf::from(&source.locator);
                if !path.is_file() {
                    return Err(EarshotError::Source(format!("File not found: {}", source.locator)));
                }

                let metadata = local::probe(&self.settings.ffprobe_binary, &path).await?;
                check_duration(source, metadata.duration_seconds, self.settings.max_duration_seconds)?;

                Ok(AcquiredMedia {
                    metadata,
                    media_path: path,
                })
            }
        }
    }
}
