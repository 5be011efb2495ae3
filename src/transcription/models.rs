//! Data models for transcription.

use crate::chunking::Chunk;
use serde::{Deserialize, Serialize};

/// A complete transcript with segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Individual transcript segments with timestamps.
    pub segments: Vec<TranscriptSegment>,
    /// Full transcript text (concatenated segments).
    pub full_text: String,
    /// Total duration in seconds.
    pub duration_seconds: f64,
    /// Language detected by the transcriber (if reported).
    #[serde(default)]
    pub language: Option<String>,
}

impl Transcript {
    /// Create a new transcript from segments.
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let duration_seconds = segments
            .last()
            .map(|s| s.end_seconds)
            .unwrap_or(0.0);

        Self {
            segments,
            full_text,
            duration_seconds,
            language: None,
        }
    }

    /// Create a transcript from plain text with no timing information.
    pub fn from_text(text: impl Into<String>, duration_seconds: f64) -> Self {
        let text = text.into();
        Self {
            segments: vec![TranscriptSegment::new(0.0, duration_seconds, text.clone())],
            full_text: text,
            duration_seconds,
            language: None,
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Number of words in the transcript.
    pub fn word_count(&self) -> usize {
        self.full_text.split_whitespace().count()
    }

    /// Start time of the segment containing the given character offset of `full_text`.
    pub fn time_at(&self, char_offset: usize) -> Option<f64> {
        let mut segment_start = 0usize;
        let mut found = None;

        for segment in &self.segments {
            if segment_start > char_offset {
                break;
            }
            found = Some(segment.start_seconds);
            // Segments are joined with a single space.
            segment_start += segment.text.chars().count() + 1;
        }

        found
    }

    /// Annotate chunks with the start time of the segment they begin in.
    pub fn timestamp_chunks(&self, chunks: &mut [Chunk]) {
        for chunk in chunks {
            chunk.start_seconds = self.time_at(chunk.start);
        }
    }
}

/// A single segment of a transcript with timestamp information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
    /// Transcribed text content.
    pub text: String,
}

impl TranscriptSegment {
    /// Create a new transcript segment.
    pub fn new(start_seconds: f64, end_seconds: f64, text: String) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text,
        }
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
