//! Embedding generation for semantic search and retrieval.

mod hashing;
mod ollama;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

use crate::config::EmbeddingSettings;
use crate::error::{EarshotError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Fixed-dimension vector representing a chunk or a query.
pub type EmbeddingVector = Vec<f32>;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Identity of the model producing the vectors.
    fn model_id(&self) -> &str;
}

/// Create an embedder from settings.
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let dimensions = settings.dimensions as usize;
    match settings.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedder::new(dimensions))),
        "ollama" => Ok(Arc::new(OllamaEmbedder::with_config(
            &settings.base_url,
            &settings.model,
            dimensions,
        )?)),
        other => Err(EarshotError::Config(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}
