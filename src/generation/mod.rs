//! Answer generation backends.
//!
//! The core hands a [`GenerationRequest`] to a [`Generator`] and gets answer
//! text back. Backends report readiness separately so callers can fail fast
//! before doing retrieval work.

mod ollama;

pub use ollama::OllamaGenerator;

use crate::config::GenerationSettings;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling parameters passed through to the backend unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl From<&GenerationSettings> for GenerationParams {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&GenerationSettings::default())
    }
}

/// A fully assembled request for the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Instruction text.
    pub preamble: String,
    /// Transcript excerpts, or an explicit no-evidence note.
    pub context: String,
    /// The user's question, verbatim.
    pub question: String,
    pub params: GenerationParams,
    /// Whether any retrieved chunk made it into the context.
    pub has_evidence: bool,
    /// Complete prompt text sent to the model.
    pub prompt: String,
}

/// Readiness of a generation backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthStatus {
    pub server_accessible: bool,
    pub model_available: bool,
    pub available_models: Vec<String>,
    /// Why the backend is not ready, when known.
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_ready(&self) -> bool {
        self.server_accessible && self.model_available
    }
}

/// Trait for answer generation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate answer text for an assembled request.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Check that the backend is reachable and the model is installed.
    async fn health_check(&self) -> HealthStatus;

    /// Model used for generation.
    fn model(&self) -> &str;
}
