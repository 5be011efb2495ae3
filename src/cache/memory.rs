//! In-memory artifact cache.
//!
//! Useful for testing and for sessions that should leave nothing on disk.

use super::{ArtifactCache, CacheEntry, CachedItem};
use crate::content::ContentId;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// In-memory artifact cache.
pub struct MemoryArtifactCache {
    entries: RwLock<HashMap<ContentId, CacheEntry>>,
}

impl MemoryArtifactCache {
    /// Create a new, empty in-memory cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryArtifactCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactCache for MemoryArtifactCache {
    fn get(&self, id: &ContentId) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(id).cloned())
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        entry.validate()?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(entry.content_id().clone(), entry.clone());
        Ok(())
    }

    fn remove(&self, id: &ContentId) -> Result<bool> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<CachedItem>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut items: Vec<CachedItem> = entries
            .values()
            .map(|entry| CachedItem {
                source: entry.source.clone(),
                title: entry.title.clone(),
                duration_seconds: entry.transcript.duration_seconds,
                chunk_count: entry.index.as_ref().map(|i| i.len()),
                cached_at: entry.cached_at,
            })
            .collect();
        items.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
        Ok(items)
    }
}
