//! Earshot - ask questions about long-form spoken content
//!
//! A local-first tool that turns a video or audio recording into a searchable
//! transcript and answers questions from it with a local language model.
//!
//! # Overview
//!
//! Earshot allows you to:
//! - Transcribe YouTube videos and local audio/video files with Whisper
//! - Chunk and embed each transcript into a per-item similarity index
//! - Keep a bounded set of items live for querying, loading each at most once
//! - Ask questions answered only from the relevant transcript excerpts
//!
//! # Architecture
//!
//! - `content` - Content identity, source references and live items
//! - `chunking` - Fixed-size overlapping transcript windows
//! - `embedding` - Embedding generation
//! - `index` - Per-item similarity index and search
//! - `cache` - Persistent transcript and index artifacts
//! - `session` - Bounded registry of live items
//! - `pipeline` - Acquire, transcribe and index stages
//! - `rag` - Context assembly and question answering
//! - `generation` - Local language model backend
//! - `source` - YouTube and local media acquisition
//! - `transcription` - Speech-to-text transcription
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use earshot::cache::create_cache;
//! use earshot::config::Settings;
//! use earshot::embedding::create_embedder;
//! use earshot::pipeline::Pipeline;
//! use earshot::session::SessionRegistry;
//! use earshot::source::parse_input;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let cache = create_cache(&settings)?;
//!     let embedder = create_embedder(&settings.embedding)?;
//!     let pipeline = Pipeline::from_settings(&settings, cache, embedder.clone())?;
//!     let registry = SessionRegistry::new(settings.session.max_items, Arc::new(pipeline), embedder)?;
//!
//!     let source = parse_input("dQw4w9WgXcQ")?;
//!     let item = registry.acquire(&source).await?;
//!     for hit in registry.search(item.id(), "what is the chorus about", 3).await? {
//!         println!("{:.2} {}", hit.score, hit.chunk.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod content;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod http;
pub mod index;
pub mod pipeline;
pub mod rag;
pub mod session;
pub mod source;
mod tool;
pub mod transcription;

pub use error::{EarshotError, Result};
