//! Local media files.
//!
//! Supports both audio and video files.

use super::MediaMetadata;
use crate::content::ContentId;
use crate::error::{EarshotError, Result};
use crate::tool;
use sha2::{Digest, Sha256};
use std::ffi::OsStr;
use std::path::Path;

/// Supported audio file extensions.
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "opus", "m4a", "wma", "aiff", "alac",
];

/// Supported video file extensions (audio will be extracted).
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v", "mpeg", "mpg", "3gp",
];

/// Check if path is a supported audio or video file.
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Stable content id for a local file, derived from its canonical path.
pub fn local_content_id(canonical_path: &Path) -> ContentId {
    let digest = Sha256::digest(canonical_path.to_string_lossy().as_bytes());
    ContentId::new(format!("local_{}", &hex::encode(digest)[..16]))
}

/// Read duration and embedded title with ffprobe.
///
/// A file ffprobe cannot read still yields metadata titled after the file.
pub(super) async fn probe(ffprobe: &str, path: &Path) -> Result<MediaMetadata> {
    let fallback_title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown")
        .to_string();

    let output = match tool::run(
        ffprobe,
        [
            OsStr::new("-v"),
            OsStr::new("quiet"),
            OsStr::new("-print_format"),
            OsStr::new("json"),
            OsStr::new("-show_format"),
            path.as_os_str(),
        ],
    )
    .await
    {
        Ok(output) => output,
        Err(e @ EarshotError::ToolNotFound(_)) => return Err(e),
        Err(_) => {
            return Ok(MediaMetadata {
                title: fallback_title,
                duration_seconds: None,
                channel: None,
            })
        }
    };

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).unwrap_or_default();

    Ok(MediaMetadata {
        title: json["format"]["tags"]["title"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or(fallback_title),
        duration_seconds: json["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok()),
        channel: json["format"]["tags"]["artist"].as_str().map(|s| s.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_extensions() {
        assert!(is_media_file(Path::new("talk.MP3")));
        assert!(is_media_file(Path::new("/videos/talk.mkv")));
        assert!(!is_media_file(Path::new("notes.txt")));
        assert!(!is_media_file(Path::new("no_extension")));
    }

    #[test]
    fn test_local_content_id_is_stable() {
        let a = local_content_id(Path::new("/media/talk.mp3"));
        let b = local_content_id(Path::new("/media/talk.mp3"));
        let c = local_content_id(Path::new("/media/other.mp3"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), "local_".len() + 16);
    }
}
