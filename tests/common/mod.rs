//! Shared in-process collaborators for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use earshot::cache::{ArtifactCache, MemoryArtifactCache};
use earshot::chunking::ChunkingConfig;
use earshot::content::{ContentId, SourceKind, SourceRef};
use earshot::embedding::HashingEmbedder;
use earshot::error::Result;
use earshot::pipeline::Pipeline;
use earshot::session::SessionRegistry;
use earshot::source::{AcquiredMedia, MediaAcquirer, MediaMetadata};
use earshot::transcription::{Transcriber, Transcript};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

/// Embedding width used by the fixtures.
pub const DIMENSIONS: usize = 4096;

/// Acquirer that "downloads" a placeholder path named after the content id.
///
/// When gated, each acquisition waits for a permit after announcing itself.
#[derive(Default)]
pub struct FakeAcquirer {
    pub calls: AtomicUsize,
    pub started: Notify,
    gate: Option<Semaphore>,
}

impl FakeAcquirer {
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaAcquirer for FakeAcquirer {
    async fn acquire(&self, source: &SourceRef, _work_dir: &Path) -> Result<AcquiredMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }

        Ok(AcquiredMedia {
            metadata: MediaMetadata {
                title: format!("Title of {}", source.id),
                duration_seconds: Some(60.0),
                channel: None,
            },
            media_path: PathBuf::from(format!("/fixtures/{}.mp3", source.id)),
        })
    }
}

/// Transcriber that returns a fixed text per media file stem.
#[derive(Default)]
pub struct FakeTranscriber {
    pub calls: AtomicUsize,
    texts: Mutex<HashMap<String, String>>,
}

impl FakeTranscriber {
    pub fn with_text(self, id: &str, text: impl Into<String>) -> Self {
        self.texts.lock().unwrap().insert(id.to_string(), text.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, media_path: &Path) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = media_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let text = self
            .texts
            .lock()
            .unwrap()
            .get(&stem)
            .cloned()
            .unwrap_or_else(|| format!("spoken words about {} and nothing else", stem));
        Ok(Transcript::from_text(text, 60.0))
    }
}

/// A registry wired to fakes over a shared cache.
pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub acquirer: Arc<FakeAcquirer>,
    pub transcriber: Arc<FakeTranscriber>,
    pub cache: Arc<dyn ArtifactCache>,
}

impl Harness {
    pub fn new(capacity: usize, acquirer: FakeAcquirer, transcriber: FakeTranscriber) -> Self {
        Self::with_cache(
            capacity,
            acquirer,
            transcriber,
            Arc::new(MemoryArtifactCache::new()),
            ChunkingConfig::default(),
        )
    }

    pub fn with_cache(
        capacity: usize,
        acquirer: FakeAcquirer,
        transcriber: FakeTranscriber,
        cache: Arc<dyn ArtifactCache>,
        chunking: ChunkingConfig,
    ) -> Self {
        let acquirer = Arc::new(acquirer);
        let transcriber = Arc::new(transcriber);
        let embedder = Arc::new(HashingEmbedder::new(DIMENSIONS));
        let pipeline = Pipeline::with_components(
            cache.clone(),
            acquirer.clone(),
            transcriber.clone(),
            embedder.clone(),
            chunking,
            std::env::temp_dir().join("earshot-tests"),
        );
        let registry = Arc::new(SessionRegistry::new(capacity, Arc::new(pipeline), embedder).unwrap());

        Self {
            registry,
            acquirer,
            transcriber,
            cache,
        }
    }
}

pub fn youtube(id: &str) -> SourceRef {
    SourceRef::new(
        ContentId::new(id),
        SourceKind::YouTube,
        format!("https://www.youtube.com/watch?v={}", id),
    )
}

/// Repeat `word ` until `len` characters, ending on a word boundary or cut short.
pub fn words(word: &str, len: usize) -> String {
    let mut text = String::new();
    while text.len() < len {
        text.push_str(word);
        text.push(' ');
    }
    text.truncate(len);
    text
}
