//! Content-addressed cache of transcripts and built indices.
//!
//! Entries are keyed by [`ContentId`] and committed atomically: a reader sees
//! either the complete previous entry or the complete new one. The cache
//! never triggers acquisition, transcription or indexing on its own.
//!
//! Ids are trusted as a proxy for content identity; a source edited after it
//! was cached keeps serving the cached transcript until it is removed.

mod memory;
mod sqlite;

pub use memory::MemoryArtifactCache;
pub use sqlite::SqliteArtifactCache;

use crate::config::Settings;
use crate::content::{ContentId, SourceRef};
use crate::error::{EarshotError, Result};
use crate::index::Index;
use crate::transcription::Transcript;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// A cached transcript and, optionally, the index built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub source: SourceRef,
    pub title: String,
    pub transcript: Transcript,
    pub index: Option<Index>,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(source: SourceRef, title: String, transcript: Transcript) -> Self {
        Self {
            source,
            title,
            transcript,
            index: None,
            cached_at: Utc::now(),
        }
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.index = Some(index);
        self
    }

    pub fn content_id(&self) -> &ContentId {
        &self.source.id
    }

    /// Reject entries whose index belongs to another item.
    fn validate(&self) -> Result<()> {
        match &self.index {
            Some(index) if index.content_id() != self.content_id() => {
                Err(EarshotError::InvalidArgument(format!(
                    "index for {} cannot be cached under {}",
                    index.content_id(),
                    self.content_id()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Summary information about a cached item.
#[derive(Debug, Clone, Serialize)]
pub struct CachedItem {
    pub source: SourceRef,
    pub title: String,
    pub duration_seconds: f64,
    /// Number of indexed chunks, if an index is cached.
    pub chunk_count: Option<usize>,
    pub cached_at: DateTime<Utc>,
}

/// Trait for artifact cache implementations.
///
/// Methods are synchronous: a `put` runs to completion without yielding, so
/// cancelling the surrounding task can never interrupt a commit.
pub trait ArtifactCache: Send + Sync {
    /// Look up a cached entry.
    fn get(&self, id: &ContentId) -> Result<Option<CacheEntry>>;

    /// Atomically write an entry, replacing any previous one for the same id.
    fn put(&self, entry: &CacheEntry) -> Result<()>;

    /// Remove an entry. Returns whether anything was removed.
    fn remove(&self, id: &ContentId) -> Result<bool>;

    /// List cached items, most recently cached first.
    fn list(&self) -> Result<Vec<CachedItem>>;
}

/// Create the cache configured in settings.
pub fn create_cache(settings: &Settings) -> Result<Arc<dyn ArtifactCache>> {
    match settings.cache.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteArtifactCache::new(&settings.sqlite_path())?)),
        "memory" => Ok(Arc::new(MemoryArtifactCache::new())),
        other => Err(EarshotError::Config(format!(
            "Unknown cache provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::chunking::{chunk, ChunkingConfig};
    use crate::content::SourceKind;
    use crate::index::{IndexEntry, IndexFingerprint};
    use crate::transcription::TranscriptSegment;

    pub fn source(id: &str) -> SourceRef {
        SourceRef::new(
            ContentId::new(id),
            SourceKind::YouTube,
            format!("https://www.youtube.com/watch?v={}", id),
        )
    }

    pub fn transcript() -> Transcript {
        Transcript::new(vec![
            TranscriptSegment::new(0.0, 4.0, "Welcome to the show".into()),
            TranscriptSegment::new(4.0, 9.5, "Today we talk about tides".into()),
        ])
    }

    pub fn index_for(id: &str, transcript: &Transcript) -> Index {
        let content_id = ContentId::new(id);
        let config = ChunkingConfig::new(16, 4).unwrap();
        let entries = chunk(&content_id, &transcript.full_text, &config)
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| IndexEntry {
                chunk,
                embedding: vec![i as f32, 1.0, -0.5],
            })
            .collect();
        Index::from_entries(content_id, IndexFingerprint::new("test", 3, 16, 4), entries).unwrap()
    }

    pub fn entry(id: &str, with_index: bool) -> CacheEntry {
        let transcript = transcript();
        let entry = CacheEntry::new(source(id), format!("Episode {}", id), transcript.clone());
        if with_index {
            entry.with_index(index_for(id, &transcript))
        } else {
            entry
        }
    }

    /// Contract checks shared by every cache implementation.
    pub fn exercise_contract(cache: &dyn ArtifactCache) {
        let id = ContentId::new("ep1");
        assert!(cache.get(&id).unwrap().is_none());

        let plain = entry("ep1", false);
        cache.put(&plain).unwrap();
        let loaded = cache.get(&id).unwrap().unwrap();
        assert_eq!(loaded.transcript, plain.transcript);
        assert!(loaded.index.is_none());

        // Re-putting identical content changes nothing observable.
        cache.put(&plain).unwrap();
        assert_eq!(cache.get(&id).unwrap().unwrap().transcript, plain.transcript);

        let indexed = entry("ep1", true);
        cache.put(&indexed).unwrap();
        let loaded = cache.get(&id).unwrap().unwrap();
        assert_eq!(loaded.index, indexed.index);
        assert_eq!(loaded.title, "Episode ep1");

        let mismatched = entry("ep2", false).with_index(index_for("ep1", &transcript()));
        assert!(matches!(
            cache.put(&mismatched),
            Err(EarshotError::InvalidArgument(_))
        ));
        assert!(cache.get(&ContentId::new("ep2")).unwrap().is_none());

        cache.put(&entry("ep2", false)).unwrap();
        let listed = cache.list().unwrap();
        assert_eq!(listed.len(), 2);
        let ep1 = listed.iter().find(|i| i.source.id == id).unwrap();
        assert_eq!(ep1.chunk_count, indexed.index.as_ref().map(|i| i.len()));

        assert!(cache.remove(&id).unwrap());
        assert!(!cache.remove(&id).unwrap());
        assert!(cache.get(&id).unwrap().is_none());
    }
}
