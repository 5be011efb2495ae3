//! YouTube acquisition through `yt-dlp`.

use super::MediaMetadata;
use crate::error::{EarshotError, Result};
use crate::tool;
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    // Matches various YouTube URL formats and bare video IDs
    Regex::new(
        r"(?x)
        (?:
            (?:https?://)?
            (?:www\.|m\.)?
            (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)
            ([a-zA-Z0-9_-]{11})
        )
        |
        ^([a-zA-Z0-9_-]{11})$
    ",
    )
    .expect("Invalid regex")
});

/// Formats tried in order until one downloads.
const FORMAT_STRATEGIES: &[&str] = &[
    "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio",
    "bestaudio/best",
    "best[height<=720]",
    "worstaudio/worst",
];

/// Extract the video id from a YouTube URL or bare id.
pub fn extract_video_id(input: &str) -> Option<String> {
    let caps = VIDEO_ID.captures(input.trim())?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Rewrite known yt-dlp failures into reasons a user can act on.
fn friendly_error(err: EarshotError) -> EarshotError {
    let EarshotError::ToolFailed(message) = &err else {
        return err;
    };

    let reason = if message.contains("Requested format is not available") {
        "The requested audio format is not available for this video. The video might be age-restricted, region-restricted, or a live stream."
    } else if message.contains("Private video") {
        "This video is private and cannot be downloaded."
    } else if message.contains("This video is not available") || message.contains("Video unavailable") {
        "This video is not available. It may have been removed or made private."
    } else {
        return err;
    };

    EarshotError::Source(reason.to_string())
}

/// Fetch title and duration with `yt-dlp --dump-json`.
pub(super) async fn fetch_metadata(binary: &str, url: &str) -> Result<MediaMetadata> {
    let output = tool::run(
        binary,
        ["--dump-json", "--no-download", "--no-warnings", "--no-playlist", url],
    )
    .await
    .map_err(friendly_error)?;

    parse_metadata(&String::from_utf8_lossy(&output.stdout))
}

fn parse_metadata(json: &str) -> Result<MediaMetadata> {
    let json: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| EarshotError::Source(format!("Failed to parse yt-dlp output: {}", e)))?;

    Ok(MediaMetadata {
        title: json["title"].as_str().unwrap_or("Unknown Title").to_string(),
        duration_seconds: json["duration"].as_f64(),
        channel: json["channel"]
            .as_str()
            .or_else(|| json["uploader"].as_str())
            .map(|s| s.to_string()),
    })
}

/// Download audio as MP3 into `output_dir`, trying each format strategy in turn.
pub(super) async fn download_audio(
    binary: &str,
    url: &str,
    video_id: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;
    let template = output_dir.join(format!("{}.%(ext)s", video_id));

    let mut last_error = None;
    for (i, format) in FORMAT_STRATEGIES.iter().enumerate() {
        debug!("Trying format strategy {}: {}", i + 1, format);

        let result = tool::run(
            binary,
            [
                OsStr::new("--format"),
                OsStr::new(format),
                OsStr::new("--extract-audio"),
                OsStr::new("--audio-format"),
                OsStr::new("mp3"),
                OsStr::new("--output"),
                template.as_os_str(),
                OsStr::new("--no-playlist"),
                OsStr::new("--quiet"),
                OsStr::new("--no-warnings"),
                OsStr::new(url),
            ],
        )
        .await;

        match result {
            Ok(_) => return find_audio_file(output_dir, video_id),
            Err(e @ EarshotError::ToolNotFound(_)) => return Err(e),
            Err(e) => {
                warn!("Format strategy {} failed: {}", i + 1, e);
                last_error = Some(e);
            }
        }
    }

    Err(friendly_error(last_error.unwrap_or_else(|| {
        EarshotError::Source("All download strategies failed".to_string())
    })))
}

/// Locate a downloaded audio file by video id.
fn find_audio_file(dir: &Path, video_id: &str) -> Result<PathBuf> {
    for ext in ["mp3", "m4a", "webm", "opus", "ogg"] {
        let candidate = dir.join(format!("{}.{}", video_id, ext));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(EarshotError::Source(
        "Audio file not found after download".to_string(),
    ))
}
