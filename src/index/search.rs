//! Top-k cosine similarity search within one item's index.

use super::{cosine_similarity, Index};
use crate::chunking::Chunk;
use crate::embedding::Embedder;
use crate::error::{EarshotError, Result};
use serde::Serialize;

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1] (higher is better).
    pub score: f32,
}

impl Index {
    /// Score every chunk against a query vector and return the `k` best.
    ///
    /// Results are ordered by descending score, ties by ascending sequence.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(EarshotError::InvalidArgument("k must be positive".to_string()));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.fingerprint().dimension {
            return Err(EarshotError::Embedding(format!(
                "query has {} dimensions, index {} has {}",
                query.len(),
                self.content_id(),
                self.fingerprint().dimension
            )));
        }

        let mut results: Vec<ScoredChunk> = self
            .entries()
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.sequence.cmp(&b.chunk.sequence))
        });
        results.truncate(k);

        Ok(results)
    }
}

/// Embed `query_text` and search `index` for the `k` nearest chunks.
///
/// An empty index yields an empty result without consulting the embedder.
pub async fn search(
    embedder: &dyn Embedder,
    index: &Index,
    query_text: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    if k == 0 {
        return Err(EarshotError::InvalidArgument("k must be positive".to_string()));
    }
    if index.is_empty() {
        return Ok(Vec::new());
    }

    let query = embedder.embed(query_text).await?;
    index.search(&query, k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentId;
    use crate::index::{IndexEntry, IndexFingerprint};

    fn entry(id: &ContentId, sequence: usize, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                content_id: id.clone(),
                sequence,
                text: format!("chunk {}", sequence),
                start: sequence * 10,
                end: sequence * 10 + 10,
                start_seconds: None,
            },
            embedding,
        }
    }

    fn index() -> Index {
        let id = ContentId::new("video");
        Index::from_entries(
            id.clone(),
            IndexFingerprint::new("test", 2, 10, 0),
            vec![
                entry(&id, 0, vec![0.0, 1.0]),
                entry(&id, 1, vec![1.0, 0.0]),
                entry(&id, 2, vec![1.0, 0.0]),
                entry(&id, 3, vec![1.0, 1.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_results_ordered_by_score_then_sequence() {
        let results = index().search(&[1.0, 0.0], 4).unwrap();
        let order: Vec<usize> = results.iter().map(|r| r.chunk.sequence).collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_k_limits_results() {
        assert_eq!(index().search(&[1.0, 0.0], 2).unwrap().len(), 2);
        assert_eq!(index().search(&[1.0, 0.0], 50).unwrap().len(), 4);
    }

    #[test]
    fn test_zero_k_is_invalid() {
        assert!(matches!(
            index().search(&[1.0, 0.0], 0),
            Err(EarshotError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let empty = Index::empty(ContentId::new("x"), IndexFingerprint::new("test", 2, 10, 0));
        assert!(empty.search(&[1.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        assert!(matches!(
            index().search(&[1.0, 0.0, 0.0], 3),
            Err(EarshotError::Embedding(_))
        ));
    }
}
