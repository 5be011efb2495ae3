//! Per-item vector index.
//!
//! An [`Index`] maps every chunk of one content item to its embedding. Indices
//! are built all-or-nothing and never share entries across items.

mod search;

pub use search::{search, ScoredChunk};

use crate::chunking::{Chunk, ChunkingConfig};
use crate::content::ContentId;
use crate::embedding::{Embedder, EmbeddingVector};
use crate::error::{EarshotError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Parameters an index was built with. A cached index is only reusable when
/// its fingerprint matches the current configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFingerprint {
    /// Embedding model identity.
    pub model: String,
    /// Embedding dimensions.
    pub dimension: usize,
    /// Chunk window length.
    pub chunk_size: usize,
    /// Chunk overlap.
    pub chunk_overlap: usize,
}

impl IndexFingerprint {
    pub fn new(model: impl Into<String>, dimension: usize, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Fingerprint for an embedder and chunking configuration.
    pub fn for_embedder(embedder: &dyn Embedder, chunking: &ChunkingConfig) -> Self {
        Self::new(
            embedder.model_id(),
            embedder.dimensions(),
            chunking.size,
            chunking.overlap,
        )
    }
}

/// A chunk together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: EmbeddingVector,
}

/// Searchable index for a single content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    content_id: ContentId,
    fingerprint: IndexFingerprint,
    entries: Vec<IndexEntry>,
}

impl Index {
    /// An index with no chunks.
    pub fn empty(content_id: ContentId, fingerprint: IndexFingerprint) -> Self {
        Self {
            content_id,
            fingerprint,
            entries: Vec::new(),
        }
    }

    /// Assemble an index from entries, enforcing ownership, dimensions and ordering.
    pub fn from_entries(
        content_id: ContentId,
        fingerprint: IndexFingerprint,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        for (position, entry) in entries.iter().enumerate() {
            if entry.chunk.content_id != content_id {
                return Err(EarshotError::InvalidArgument(format!(
                    "chunk {} belongs to {}, not {}",
                    entry.chunk.sequence, entry.chunk.content_id, content_id
                )));
            }
            if entry.chunk.sequence != position {
                return Err(EarshotError::InvalidArgument(format!(
                    "chunk at position {} has sequence {}",
                    position, entry.chunk.sequence
                )));
            }
            if entry.embedding.len() != fingerprint.dimension {
                return Err(EarshotError::InvalidArgument(format!(
                    "embedding for chunk {} has {} dimensions, expected {}",
                    entry.chunk.sequence,
                    entry.embedding.len(),
                    fingerprint.dimension
                )));
            }
        }

        Ok(Self {
            content_id,
            fingerprint,
            entries,
        })
    }

    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    pub fn fingerprint(&self) -> &IndexFingerprint {
        &self.fingerprint
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Look up a chunk by sequence index.
    pub fn chunk(&self, sequence: usize) -> Option<&Chunk> {
        self.entries.get(sequence).map(|e| &e.chunk)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Embed every chunk and assemble an index scoped to `content_id`.
///
/// Nothing is returned unless every chunk was embedded, so a failed build
/// leaves any previously published index untouched.
#[instrument(skip(embedder, chunks, chunking), fields(content_id = %content_id, chunks = chunks.len()))]
pub async fn build_index(
    embedder: &dyn Embedder,
    content_id: &ContentId,
    chunks: Vec<Chunk>,
    chunking: &ChunkingConfig,
) -> Result<Index> {
    let fingerprint = IndexFingerprint::for_embedder(embedder, chunking);

    if let Some(foreign) = chunks.iter().find(|c| &c.content_id != content_id) {
        return Err(EarshotError::InvalidArgument(format!(
            "cannot index chunk of {} into {}",
            foreign.content_id, content_id
        )));
    }

    if chunks.is_empty() {
        debug!("No chunks to index");
        return Ok(Index::empty(content_id.clone(), fingerprint));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;

    if embeddings.len() != chunks.len() {
        return Err(EarshotError::Embedding(format!(
            "expected {} embeddings, got {}",
            chunks.len(),
            embeddings.len()
        )));
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != fingerprint.dimension) {
        return Err(EarshotError::Embedding(format!(
            "embedding has {} dimensions, expected {}",
            bad.len(),
            fingerprint.dimension
        )));
    }

    let entries = chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
        .collect();

    let index = Index::from_entries(content_id.clone(), fingerprint, entries)?;
    debug!("Built index with {} entries", index.len());
    Ok(index)
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::chunk;
    use crate::embedding::HashingEmbedder;
    use async_trait::async_trait;

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<EmbeddingVector> {
            Err(EarshotError::Embedding("backend offline".into()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<EmbeddingVector>> {
            Err(EarshotError::Embedding("backend offline".into()))
        }

        fn dimensions(&self) -> usize {
            8
        }

        fn model_id(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_build_index_embeds_every_chunk() {
        let id = ContentId::new("a");
        let config = ChunkingConfig::new(20, 5).unwrap();
        let chunks = chunk(&id, "a fairly short transcript about sailing boats", &config).unwrap();
        let expected = chunks.len();

        let embedder = HashingEmbedder::new(16);
        let index = build_index(&embedder, &id, chunks, &config).await.unwrap();

        assert_eq!(index.len(), expected);
        assert_eq!(index.fingerprint(), &IndexFingerprint::new("hashing-16", 16, 20, 5));
        assert!(index.entries().iter().all(|e| e.embedding.len() == 16));
        assert_eq!(index.chunk(0).map(|c| c.start), Some(0));
    }

    #[tokio::test]
    async fn test_build_index_rejects_foreign_chunks() {
        let config = ChunkingConfig::new(20, 5).unwrap();
        let chunks = chunk(&ContentId::new("b"), "belongs elsewhere", &config).unwrap();

        let err = build_index(&HashingEmbedder::new(8), &ContentId::new("a"), chunks, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, EarshotError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_build_index_fails_atomically_when_backend_down() {
        let id = ContentId::new("a");
        let config = ChunkingConfig::new(20, 5).unwrap();
        let chunks = chunk(&id, "some words that need vectors", &config).unwrap();

        let err = build_index(&FailingEmbedder, &id, chunks, &config).await.unwrap_err();
        assert!(matches!(err, EarshotError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_build_index_of_nothing_is_empty() {
        let id = ContentId::new("a");
        let config = ChunkingConfig::default();
        let index = build_index(&FailingEmbedder, &id, Vec::new(), &config).await.unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_from_entries_checks_dimensions() {
        let id = ContentId::new("a");
        let chunk = Chunk {
            content_id: id.clone(),
            sequence: 0,
            text: "x".into(),
            start: 0,
            end: 1,
            start_seconds: None,
        };
        let entries = vec![IndexEntry {
            chunk,
            embedding: vec![1.0, 2.0],
        }];
        let result = Index::from_entries(id, IndexFingerprint::new("m", 3, 10, 1), entries);
        assert!(matches!(result, Err(EarshotError::InvalidArgument(_))));
    }
}
