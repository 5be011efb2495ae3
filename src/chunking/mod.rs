//! Transcript chunking into overlapping fixed-size windows.
//!
//! Sizes and offsets are measured in Unicode scalar values (characters), so a
//! window never splits a multi-byte character.

use crate::content::ContentId;
use crate::error::{EarshotError, Result};
use serde::{Deserialize, Serialize};

/// A contiguous span of transcript text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Content item this chunk belongs to.
    pub content_id: ContentId,
    /// 0-based position of this chunk in the transcript.
    pub sequence: usize,
    /// Text content of this chunk.
    pub text: String,
    /// Character offset of the first character (inclusive).
    pub start: usize,
    /// Character offset one past the last character (exclusive).
    pub end: usize,
    /// Start time of the transcript segment the chunk begins in.
    #[serde(default)]
    pub start_seconds: Option<f64>,
}

impl Chunk {
    /// Number of characters in this chunk.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Window length in characters.
    pub size: usize,
    /// Characters shared by consecutive windows.
    pub overlap: usize,
}

impl ChunkingConfig {
    /// Create a validated chunking configuration.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        let config = Self { size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(EarshotError::Config("chunk size must be positive".to_string()));
        }
        if self.overlap >= self.size {
            return Err(EarshotError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.size
            )));
        }
        Ok(())
    }

    /// Distance between the starts of consecutive windows.
    pub fn stride(&self) -> usize {
        self.size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: 1000,
            overlap: 100,
        }
    }
}

/// Split `text` into windows of `config.size` characters advancing by
/// `size - overlap`. The final window may be shorter but is never empty.
pub fn chunk(content_id: &ContentId, text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    // Byte position of every character boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < char_count {
        let end = (start + config.size).min(char_count);

        chunks.push(Chunk {
            content_id: content_id.clone(),
            sequence: chunks.len(),
            text: text[bounds[start]..bounds[end]].to_string(),
            start,
            end,
            start_seconds: None,
        });

        if end == char_count {
            break;
        }
        start += config.stride();
    }

    Ok(chunks)
}
