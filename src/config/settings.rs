//! Configuration settings for Earshot.

use crate::chunking::ChunkingConfig;
use crate::error::{EarshotError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub acquisition: AcquisitionSettings,
    pub transcription: TranscriptionSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub session: SessionSettings,
    pub cache: CacheSettings,
    pub generation: GenerationSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for downloaded media.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.earshot".to_string(),
            temp_dir: "/tmp/earshot".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Media acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Longest media accepted, in seconds.
    pub max_duration_seconds: u32,
    /// Downloader binary for remote sources.
    pub ytdlp_binary: String,
    /// Probe binary used to read local media duration.
    pub ffprobe_binary: String,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            max_duration_seconds: 7200, // 2 hours
            ytdlp_binary: "yt-dlp".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Whisper command-line binary.
    pub binary: String,
    /// Whisper model name.
    pub model: String,
    /// Spoken language; detected automatically when unset.
    pub language: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            binary: "whisper".to_string(),
            model: "base".to_string(),
            language: None,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (ollama, hashing).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Base URL of the embedding server.
    pub base_url: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "all-minilm".to_string(),
            dimensions: 384,
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Transcript chunking settings, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        let config = ChunkingConfig::default();
        Self {
            size: config.size,
            overlap: config.overlap,
        }
    }
}

impl ChunkingSettings {
    /// Validated chunking configuration.
    pub fn to_config(&self) -> Result<ChunkingConfig> {
        ChunkingConfig::new(self.size, self.overlap)
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Character budget for the assembled context block.
    pub max_context_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_context_chars: 4000,
        }
    }
}

/// Session registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Maximum number of items kept searchable at once.
    pub max_items: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { max_items: 5 }
    }
}

/// Artifact cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.earshot/cache.db".to_string(),
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Generation model.
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Health check timeout in seconds.
    pub health_timeout_seconds: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "mistral".to_string(),
            max_tokens: 512,
            temperature: 0.3,
            top_p: 0.9,
            timeout_seconds: 60,
            health_timeout_seconds: 5,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EarshotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that cannot produce a working pipeline.
    pub fn validate(&self) -> Result<()> {
        self.chunking.to_config()?;

        if self.retrieval.top_k == 0 {
            return Err(EarshotError::Config("retrieval.top_k must be positive".to_string()));
        }
        if self.retrieval.max_context_chars == 0 {
            return Err(EarshotError::Config(
                "retrieval.max_context_chars must be positive".to_string(),
            ));
        }
        if self.session.max_items == 0 {
            return Err(EarshotError::Config("session.max_items must be positive".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(EarshotError::Config(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        if !matches!(self.embedding.provider.as_str(), "ollama" | "hashing") {
            return Err(EarshotError::Config(format!(
                "Unknown embedding provider: {}",
                self.embedding.provider
            )));
        }
        if self.embedding.provider == "ollama" && self.embedding.model.trim().is_empty() {
            return Err(EarshotError::Config("embedding.model must be set".to_string()));
        }
        if !matches!(self.cache.provider.as_str(), "sqlite" | "memory") {
            return Err(EarshotError::Config(format!(
                "Unknown cache provider: {}",
                self.cache.provider
            )));
        }
        if self.generation.model.trim().is_empty() {
            return Err(EarshotError::Config("generation.model must be set".to_string()));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(EarshotError::Config(format!(
                "generation.temperature must be within [0, 2], got {}",
                self.generation.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err(EarshotError::Config(format!(
                "generation.top_p must be within [0, 1], got {}",
                self.generation.top_p
            )));
        }
        if self.generation.max_tokens == 0 || self.generation.timeout_seconds == 0 {
            return Err(EarshotError::Config(
                "generation.max_tokens and generation.timeout_seconds must be positive".to_string(),
            ));
        }
        if self.acquisition.max_duration_seconds == 0 {
            return Err(EarshotError::Config(
                "acquisition.max_duration_seconds must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("earshot")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.cache.sqlite_path)
    }
}
