//! Configuration module for Earshot.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts};
pub use settings::{
    AcquisitionSettings, CacheSettings, ChunkingSettings, EmbeddingSettings, GeneralSettings,
    GenerationSettings, PromptSettings, RetrievalSettings, SessionSettings, Settings,
    TranscriptionSettings,
};
