//! Question answering engine.

use super::{ContextAssembler, SourceCitation};
use crate::content::ContentId;
use crate::error::{EarshotError, Result};
use crate::generation::{GenerationRequest, Generator};
use crate::index::ScoredChunk;
use crate::session::SessionRegistry;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Chunks retrieved for a question and the request assembled from them.
///
/// Kept separate from generation so a failed or timed-out generation can be
/// retried without searching again.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub content_id: ContentId,
    pub question: String,
    /// Search results, best first.
    pub chunks: Vec<ScoredChunk>,
    /// Chunks that made it into the context.
    pub sources: Vec<SourceCitation>,
    pub request: GenerationRequest,
}

/// A generated answer with the excerpts it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub content_id: ContentId,
    pub question: String,
    pub text: String,
    pub sources: Vec<SourceCitation>,
}

impl Answer {
    /// Format the answer for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.text.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for source in &self.sources {
                output.push_str(&format!(
                    "\n[{}] chunk {} @ {} (score: {:.2})",
                    source.rank,
                    source.sequence,
                    source.timestamp.as_deref().unwrap_or("--:--"),
                    source.score
                ));
                if let Some(url) = &source.url {
                    output.push_str(&format!("\n  {}", url));
                }
            }
        }

        output
    }
}

/// Clean up raw model output.
///
/// Trims whitespace and strips a leading `ANSWER:` echoed from the prompt.
/// An empty answer is an error.
pub fn normalize_answer(raw: &str) -> Result<String> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("ANSWER:") {
        text = rest.trim_start();
    }

    if text.is_empty() {
        return Err(EarshotError::Generation(
            "model returned an empty answer".to_string(),
        ));
    }
    Ok(text.to_string())
}

/// Answers questions about live items in a session registry.
pub struct QaEngine {
    registry: Arc<SessionRegistry>,
    generator: Arc<dyn Generator>,
    assembler: ContextAssembler,
    top_k: usize,
}

impl QaEngine {
    pub fn new(
        registry: Arc<SessionRegistry>,
        generator: Arc<dyn Generator>,
        assembler: ContextAssembler,
        top_k: usize,
    ) -> Self {
        Self {
            registry,
            generator,
            assembler,
            top_k,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Search an item and assemble the generation request.
    #[instrument(skip(self, content_id, question), fields(content_id = %content_id))]
    pub async fn retrieve(&self, content_id: &ContentId, question: &str) -> Result<Retrieval> {
        if question.trim().is_empty() {
            return Err(EarshotError::InvalidArgument("question must not be empty".to_string()));
        }

        let chunks = self.registry.search(content_id, question, self.top_k).await?;
        let request = self.assembler.assemble(question, &chunks);
        let sources = self
            .assembler
            .select(&chunks)
            .into_iter()
            .enumerate()
            .map(|(i, scored)| SourceCitation::new(i + 1, scored))
            .collect();

        debug!("Retrieved {} chunks", chunks.len());

        Ok(Retrieval {
            content_id: content_id.clone(),
            question: question.to_string(),
            chunks,
            sources,
            request,
        })
    }

    /// Generate an answer for a completed retrieval.
    #[instrument(skip(self, retrieval), fields(content_id = %retrieval.content_id))]
    pub async fn generate(&self, retrieval: &Retrieval) -> Result<Answer> {
        let raw = self.generator.generate(&retrieval.request).await?;
        let text = normalize_answer(&raw)?;

        info!("Answered with {} sources", retrieval.sources.len());

        Ok(Answer {
            content_id: retrieval.content_id.clone(),
            question: retrieval.question.clone(),
            text,
            sources: retrieval.sources.clone(),
        })
    }

    /// Check the generator, retrieve, then generate.
    #[instrument(skip(self, content_id, question), fields(content_id = %content_id))]
    pub async fn ask(&self, content_id: &ContentId, question: &str) -> Result<Answer> {
        let health = self.generator.health_check().await;
        if !health.is_ready() {
            return Err(EarshotError::GenerationUnavailable(
                health
                    .error
                    .unwrap_or_else(|| format!("model {} is not ready", self.generator.model())),
            ));
        }

        let retrieval = self.retrieve(content_id, question).await?;
        self.generate(&retrieval).await
    }
}
