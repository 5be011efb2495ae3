//! Ollama generation backend (`POST /api/generate`).

use super::{GenerationRequest, Generator, HealthStatus};
use crate::config::GenerationSettings;
use crate::error::{EarshotError, Result};
use crate::http::{create_client_with_timeout, endpoint};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Sequences that end an answer before the model starts inventing a new turn.
const STOP_SEQUENCES: &[&str] = &["\n\nUSER:", "USER QUESTION:", "VIDEO TRANSCRIPT:"];

/// Generator backed by a local Ollama server.
pub struct OllamaGenerator {
    client: reqwest::Client,
    health_client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_seconds: u64,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
    stop: &'a [&'a str],
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(Duration::from_secs(settings.timeout_seconds))?,
            health_client: create_client_with_timeout(Duration::from_secs(
                settings.health_timeout_seconds,
            ))?,
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            timeout_seconds: settings.timeout_seconds,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, err: reqwest::Error) -> EarshotError {
        if err.is_timeout() {
            EarshotError::GenerationTimeout(self.timeout_seconds)
        } else if err.is_connect() {
            EarshotError::GenerationUnavailable(format!(
                "cannot connect to Ollama at {}. Is `ollama serve` running?",
                self.base_url
            ))
        } else {
            EarshotError::GenerationUnavailable(err.to_string())
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    #[instrument(skip(self, request), fields(model = %self.model, prompt_chars = request.prompt.len()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!("Requesting completion");

        let response = self
            .client
            .post(endpoint(&self.base_url, "/api/generate"))
            .json(&GenerateRequest {
                model: &self.model,
                prompt: &request.prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: request.params.temperature,
                    num_predict: request.params.max_tokens,
                    top_p: request.params.top_p,
                    stop: STOP_SEQUENCES,
                },
            })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EarshotError::GenerationUnavailable(format!(
                "Ollama returned {}: {}",
                status,
                detail.trim()
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                EarshotError::GenerationTimeout(self.timeout_seconds)
            } else {
                EarshotError::Generation(format!("Malformed response from Ollama: {}", e))
            }
        })?;

        info!("Generated {} characters", body.response.len());
        Ok(body.response)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> HealthStatus {
        let response = match self
            .health_client
            .get(endpoint(&self.base_url, "/api/tags"))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                return HealthStatus {
                    error: Some(format!("Ollama returned {}", r.status())),
                    ..Default::default()
                }
            }
            Err(e) => {
                warn!("Ollama health check failed: {}", e);
                return HealthStatus {
                    error: Some(format!("cannot reach Ollama at {}", self.base_url)),
                    ..Default::default()
                };
            }
        };

        let tags = match response.json::<TagsResponse>().await {
            Ok(tags) => tags,
            Err(e) => {
                return HealthStatus {
                    server_accessible: true,
                    error: Some(format!("unexpected /api/tags response: {}", e)),
                    ..Default::default()
                }
            }
        };

        let available_models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        let model_available = available_models.iter().any(|name| name.starts_with(&self.model));

        HealthStatus {
            server_accessible: true,
            model_available,
            error: (!model_available).then(|| {
                format!("model '{}' is not installed; run `ollama pull {}`", self.model, self.model)
            }),
            available_models,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
