//! Core data model: content identity, source references and live items.

use crate::index::Index;
use crate::transcription::Transcript;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Deterministic identifier of a piece of content.
///
/// Used as the key for caching, indexing and isolation. Two references that
/// resolve to the same id are assumed to carry identical content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Kind of content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    YouTube,
    Local,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::YouTube => write!(f, "youtube"),
            SourceKind::Local => write!(f, "local"),
        }
    }
}

/// A resolved reference to a piece of content: its id plus where to fetch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: ContentId,
    pub kind: SourceKind,
    /// URL or canonical file path.
    pub locator: String,
}

impl SourceRef {
    pub fn new(id: ContentId, kind: SourceKind, locator: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            locator: locator.into(),
        }
    }
}

/// Processing state of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ItemState {
    Absent,
    Acquiring,
    Transcribing,
    Indexing,
    Ready,
    Failed(String),
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemState::Absent => write!(f, "absent"),
            ItemState::Acquiring => write!(f, "acquiring"),
            ItemState::Transcribing => write!(f, "transcribing"),
            ItemState::Indexing => write!(f, "indexing"),
            ItemState::Ready => write!(f, "ready"),
            ItemState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// A live, searchable content item owned by the session registry.
///
/// The index is published behind a lock holding an `Arc`: readers take a
/// snapshot and a rebuild swaps in a complete replacement.
#[derive(Debug)]
pub struct ContentItem {
    id: ContentId,
    title: String,
    duration_seconds: f64,
    transcript: Arc<Transcript>,
    index: RwLock<Arc<Index>>,
}

impl ContentItem {
    pub fn new(id: ContentId, title: String, transcript: Transcript, index: Index) -> Self {
        Self {
            id,
            title,
            duration_seconds: transcript.duration_seconds,
            transcript: Arc::new(transcript),
            index: RwLock::new(Arc::new(index)),
        }
    }

    pub fn id(&self) -> &ContentId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn transcript(&self) -> Arc<Transcript> {
        self.transcript.clone()
    }

    /// Snapshot of the most recently completed index.
    pub fn index(&self) -> Arc<Index> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish a fully built replacement index.
    pub(crate) fn replace_index(&self, index: Index) {
        let mut slot = self.index.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexFingerprint;
    use crate::transcription::TranscriptSegment;

    fn fingerprint() -> IndexFingerprint {
        IndexFingerprint::new("test", 3, 10, 2)
    }

    #[test]
    fn test_replace_index_keeps_old_snapshot_readable() {
        let transcript = Transcript::new(vec![TranscriptSegment::new(0.0, 4.0, "hello".into())]);
        let id = ContentId::new("item");
        let item = ContentItem::new(
            id.clone(),
            "Item".into(),
            transcript,
            Index::empty(id.clone(), fingerprint()),
        );

        let before = item.index();
        item.replace_index(Index::empty(id, IndexFingerprint::new("other", 3, 10, 2)));

        assert_eq!(before.fingerprint().model, "test");
        assert_eq!(item.index().fingerprint().model, "other");
        assert_eq!(item.duration_seconds(), 4.0);
    }

    #[test]
    fn test_item_state_display() {
        assert_eq!(ItemState::Indexing.to_string(), "indexing");
        assert_eq!(ItemState::Failed("boom".into()).to_string(), "failed: boom");
    }
}
