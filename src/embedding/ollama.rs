//! Ollama embeddings implementation.

use super::{Embedder, EmbeddingVector};
use crate::error::{EarshotError, Result};
use crate::http::{create_client, endpoint};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Embedder backed by a local Ollama server (`POST /api/embed`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config("http://localhost:11434", "all-minilm", 384)
    }

    /// Create a new Ollama embedder with custom server, model and dimensions.
    pub fn with_config(base_url: &str, model: &str, dimensions: usize) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            base_url: base_url.to_string(),
            model: model.to_string(),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EarshotError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        // Keep request bodies bounded for long transcripts
        const BATCH_SIZE: usize = 64;
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(BATCH_SIZE) {
            let response = self
                .client
                .post(endpoint(&self.base_url, "/api/embed"))
                .json(&EmbedRequest {
                    model: &self.model,
                    input: batch,
                })
                .send()
                .await
                .map_err(|e| EarshotError::Embedding(format!("Embedding backend unreachable: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(EarshotError::Embedding(format!(
                    "Embedding backend returned {}: {}",
                    status, detail
                )));
            }

            let body: EmbedResponse = response
                .json()
                .await
                .map_err(|e| EarshotError::Embedding(format!("Malformed embedding response: {}", e)))?;

            if body.embeddings.len() != batch.len() {
                return Err(EarshotError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    body.embeddings.len()
                )));
            }

            for embedding in body.embeddings {
                if embedding.len() != self.dimensions {
                    return Err(EarshotError::Embedding(format!(
                        "Model {} returned {} dimensions, expected {}",
                        self.model,
                        embedding.len(),
                        self.dimensions
                    )));
                }
                all_embeddings.push(embedding);
            }
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
