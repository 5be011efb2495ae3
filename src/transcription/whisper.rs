//! Local Whisper transcription via the `whisper` command-line tool.

use super::{Transcriber, Transcript, TranscriptSegment};
use crate::config::TranscriptionSettings;
use crate::error::{EarshotError, Result};
use crate::tool;
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::Path;
use tracing::{info, instrument};

/// Transcriber backed by the `openai-whisper` CLI running locally.
pub struct WhisperCliTranscriber {
    binary: String,
    model: String,
    language: Option<String>,
}

#[derive(Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    language: Option<String>,
}

#[derive(Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

impl WhisperCliTranscriber {
    pub fn new(settings: &TranscriptionSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            model: settings.model.clone(),
            language: settings.language.clone(),
        }
    }

    /// Binary this transcriber invokes.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Parse the JSON document whisper writes with `--output_format json`.
    pub fn parse_output(json: &str) -> Result<Transcript> {
        let output: WhisperOutput = serde_json::from_str(json)?;

        let segments: Vec<TranscriptSegment> = output
            .segments
            .into_iter()
            .filter_map(|s| {
                let text = s.text.trim();
                (!text.is_empty()).then(|| TranscriptSegment::new(s.start, s.end, text.to_string()))
            })
            .collect();

        let transcript = if segments.is_empty() {
            Transcript::from_text(output.text.trim(), 0.0)
        } else {
            Transcript::new(segments)
        };

        Ok(transcript.with_language(output.language))
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    #[instrument(skip(self), fields(media_path = %media_path.display()))]
    async fn transcribe(&self, media_path: &Path) -> Result<Transcript> {
        info!("Transcribing with whisper model {}", self.model);

        let output_dir = tempfile::tempdir()?;

        let mut args: Vec<OsString> = vec![
            OsString::from(media_path),
            OsString::from("--model"),
            OsString::from(&self.model),
            OsString::from("--output_format"),
            OsString::from("json"),
            OsString::from("--output_dir"),
            OsString::from(output_dir.path()),
            OsString::from("--verbose"),
            OsString::from("False"),
        ];
        if let Some(language) = &self.language {
            args.push(OsString::from("--language"));
            args.push(OsString::from(language));
        }

        tool::run(&self.binary, args).await?;

        let stem = media_path
            .file_stem()
            .ok_or_else(|| EarshotError::InvalidArgument(format!("{} has no file name", media_path.display())))?;
        let json_path = output_dir
            .path()
            .join(format!("{}.json", stem.to_string_lossy()));
        let json = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            EarshotError::ToolFailed(format!("whisper produced no transcript at {}: {}", json_path.display(), e))
        })?;

        let transcript = Self::parse_output(&json)?;
        info!(
            "Transcribed {} segments ({} words)",
            transcript.segments.len(),
            transcript.word_count()
        );
        Ok(transcript)
    }
}
