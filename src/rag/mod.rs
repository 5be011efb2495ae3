//! Grounded question answering over one content item.
//!
//! Retrieval picks the chunks closest to a question, the assembler turns them
//! into a bounded prompt, and a generator writes the answer.

pub mod context;
mod response;

pub use context::ContextAssembler;
pub use response::{normalize_answer, Answer, QaEngine, Retrieval};

use crate::content::ContentId;
use crate::index::ScoredChunk;
use crate::source::watch_url;
use crate::transcription::format_timestamp;
use serde::Serialize;

/// A retrieved chunk as presented to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    /// 1-based rank in the retrieval result.
    pub rank: usize,
    pub content_id: ContentId,
    /// Chunk sequence index within the item.
    pub sequence: usize,
    /// Similarity score.
    pub score: f32,
    /// Formatted timestamp (e.g., "02:34"), when known.
    pub timestamp: Option<String>,
    /// URL with timestamp (for YouTube items).
    pub url: Option<String>,
    pub excerpt: String,
}

impl SourceCitation {
    pub fn new(rank: usize, scored: &ScoredChunk) -> Self {
        let chunk = &scored.chunk;
        let id = chunk.content_id.as_str();
        let url = (!id.starts_with("local_")).then(|| match chunk.start_seconds {
            Some(seconds) => format!("{}&t={}s", watch_url(id), seconds as u32),
            None => watch_url(id),
        });

        Self {
            rank,
            content_id: chunk.content_id.clone(),
            sequence: chunk.sequence,
            score: scored.score,
            timestamp: chunk.start_seconds.map(format_timestamp),
            url,
            excerpt: chunk.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;

    fn scored(id: &str, start_seconds: Option<f64>) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                content_id: ContentId::new(id),
                sequence: 4,
                text: "excerpt".into(),
                start: 0,
                end: 7,
                start_seconds,
            },
            score: 0.5,
        }
    }

    #[test]
    fn test_youtube_citation_links_to_timestamp() {
        let citation = SourceCitation::new(1, &scored("dQw4w9WgXcQ", Some(95.4)));
        assert_eq!(citation.timestamp.as_deref(), Some("01:35"));
        assert_eq!(
            citation.url.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=95s")
        );
    }

    #[test]
    fn test_local_citation_has_no_url() {
        let citation = SourceCitation::new(2, &scored("local_0123456789abcdef", None));
        assert!(citation.url.is_none());
        assert!(citation.timestamp.is_none());
        assert_eq!(citation.sequence, 4);
    }
}
