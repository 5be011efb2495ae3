//! Staged content pipeline.
//!
//! Takes a source from nothing to a searchable [`ContentItem`]:
//! acquire → transcribe → index, resuming from whatever the artifact cache
//! already holds. A cached transcript skips acquisition and transcription; a
//! cached index whose fingerprint matches the current configuration skips
//! indexing too.

use crate::cache::{ArtifactCache, CacheEntry};
use crate::chunking::{chunk, ChunkingConfig};
use crate::config::Settings;
use crate::content::{ContentId, ContentItem, ItemState, SourceRef};
use crate::embedding::Embedder;
use crate::error::{EarshotError, Result};
use crate::index::{build_index, Index, IndexFingerprint};
use crate::session::{ItemLoader, StageReporter};
use crate::source::{MediaAcquirer, ToolAcquirer};
use crate::transcription::{Transcriber, Transcript, WhisperCliTranscriber};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Loader that runs the acquisition, transcription and indexing stages.
pub struct Pipeline {
    cache: Arc<dyn ArtifactCache>,
    acquirer: Arc<dyn MediaAcquirer>,
    transcriber: Arc<dyn Transcriber>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    work_dir: PathBuf,
}

impl Pipeline {
    /// Create a pipeline with the tool-backed acquirer and transcriber.
    pub fn from_settings(
        settings: &Settings,
        cache: Arc<dyn ArtifactCache>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        Ok(Self::with_components(
            cache,
            Arc::new(ToolAcquirer::new(settings.acquisition.clone())),
            Arc::new(WhisperCliTranscriber::new(&settings.transcription)),
            embedder,
            settings.chunking.to_config()?,
            settings.temp_dir(),
        ))
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        cache: Arc<dyn ArtifactCache>,
        acquirer: Arc<dyn MediaAcquirer>,
        transcriber: Arc<dyn Transcriber>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            cache,
            acquirer,
            transcriber,
            embedder,
            chunking,
            work_dir,
        }
    }

    pub fn cache(&self) -> Arc<dyn ArtifactCache> {
        self.cache.clone()
    }

    fn fingerprint(&self) -> IndexFingerprint {
        IndexFingerprint::for_embedder(self.embedder.as_ref(), &self.chunking)
    }

    /// Fetch the media and transcribe it, committing the transcript to the cache.
    async fn transcribe_source(
        &self,
        source: &SourceRef,
        progress: &StageReporter,
    ) -> Result<(CacheEntry, bool)> {
        progress.report(ItemState::Acquiring);
        let media = self
            .acquirer
            .acquire(source, &self.work_dir)
            .await
            .map_err(|e| EarshotError::Acquisition {
                content_id: source.id.to_string(),
                source: Box::new(e),
            })?;
        info!("Acquired \"{}\"", media.metadata.title);

        progress.report(ItemState::Transcribing);
        let result = self.transcriber.transcribe(&media.media_path).await;

        if media.media_path.starts_with(&self.work_dir) {
            if let Err(e) = tokio::fs::remove_file(&media.media_path).await {
                warn!("Failed to clean up downloaded media: {}", e);
            }
        }

        let transcript = result.map_err(|e| EarshotError::Transcription {
            content_id: source.id.to_string(),
            source: Box::new(e),
        })?;
        info!(
            "Transcribed {} segments ({} characters)",
            transcript.segments.len(),
            transcript.full_text.chars().count()
        );

        let entry = CacheEntry::new(source.clone(), media.metadata.title, transcript);
        let committed = match self.cache.put(&entry) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to cache transcript for {}: {}", source.id, e);
                false
            }
        };

        Ok((entry, committed))
    }

    /// Chunk and embed a transcript under the current configuration.
    async fn build(&self, content_id: &ContentId, transcript: &Transcript) -> Result<Index> {
        let mut chunks = chunk(content_id, &transcript.full_text, &self.chunking)?;
        transcript.timestamp_chunks(&mut chunks);
        build_index(self.embedder.as_ref(), content_id, chunks, &self.chunking).await
    }
}

#[async_trait]
impl ItemLoader for Pipeline {
    #[instrument(skip(self, progress), fields(content_id = %source.id))]
    async fn load(&self, source: &SourceRef, progress: &StageReporter) -> Result<ContentItem> {
        let fingerprint = self.fingerprint();

        let (entry, transcript_cached) = match self.cache.get(&source.id)? {
            Some(entry) => {
                if let Some(index) = entry.index.clone() {
                    if index.fingerprint() == &fingerprint {
                        info!("Loaded {} from cache", source.id);
                        return Ok(ContentItem::new(
                            source.id.clone(),
                            entry.title,
                            entry.transcript,
                            index,
                        ));
                    }
                    debug!(
                        "Cached index was built with {:?}, rebuilding for {:?}",
                        index.fingerprint(),
                        fingerprint
                    );
                }
                info!("Resuming {} from cached transcript", source.id);
                (entry, true)
            }
            None => self.transcribe_source(source, progress).await?,
        };

        progress.report(ItemState::Indexing);
        let index = match self.build(&source.id, &entry.transcript).await {
            Ok(index) => index,
            Err(e) if transcript_cached => {
                return Err(EarshotError::IndexingIncomplete {
                    content_id: source.id.to_string(),
                    source: Box::new(e),
                })
            }
            Err(e) => return Err(e),
        };
        info!("Indexed {} chunks", index.len());

        let entry = entry.with_index(index.clone());
        if let Err(e) = self.cache.put(&entry) {
            warn!("Failed to cache index for {}: {}", source.id, e);
        }

        Ok(ContentItem::new(
            source.id.clone(),
            entry.title,
            entry.transcript,
            index,
        ))
    }

    #[instrument(skip(self, item), fields(content_id = %item.id()))]
    async fn reindex(&self, item: &ContentItem) -> Result<Index> {
        let index = self.build(item.id(), &item.transcript()).await?;

        match self.cache.get(item.id())? {
            Some(entry) => {
                if let Err(e) = self.cache.put(&entry.with_index(index.clone())) {
                    warn!("Failed to cache rebuilt index for {}: {}", item.id(), e);
                }
            }
            None => debug!("No cache entry for {}, rebuilt index kept in memory only", item.id()),
        }

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryArtifactCache;
    use crate::content::SourceKind;
    use crate::embedding::{EmbeddingVector, HashingEmbedder};
    use crate::source::{AcquiredMedia, MediaMetadata};
    use crate::transcription::TranscriptSegment;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeAcquirer {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl MediaAcquirer for FakeAcquirer {
        async fn acquire(&self, source: &SourceRef, _work_dir: &Path) -> Result<AcquiredMedia> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EarshotError::Source("This video is private and cannot be downloaded.".into()));
            }
            Ok(AcquiredMedia {
                metadata: MediaMetadata {
                    title: format!("Talk {}", source.id),
                    duration_seconds: Some(20.0),
                    channel: None,
                },
                media_path: PathBuf::from(&source.locator),
            })
        }
    }

    struct FakeTranscriber {
        fail: bool,
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, _media_path: &Path) -> Result<Transcript> {
            if self.fail {
                return Err(EarshotError::ToolFailed("whisper crashed".into()));
            }
            Ok(Transcript::new(vec![
                TranscriptSegment::new(0.0, 10.0, "Tides are driven by the moon.".into()),
                TranscriptSegment::new(10.0, 20.0, "Volcanoes form where plates meet.".into()),
            ]))
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<EmbeddingVector> {
            Err(EarshotError::Embedding("backend down".into()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<EmbeddingVector>> {
            Err(EarshotError::Embedding("backend down".into()))
        }

        fn dimensions(&self) -> usize {
            32
        }

        fn model_id(&self) -> &str {
            "broken"
        }
    }

    struct Setup {
        cache: Arc<MemoryArtifactCache>,
        acquirer: Arc<FakeAcquirer>,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                cache: Arc::new(MemoryArtifactCache::new()),
                acquirer: Arc::new(FakeAcquirer {
                    calls: AtomicUsize::new(0),
                    fail: false,
                }),
            }
        }

        fn pipeline(&self, embedder: Arc<dyn Embedder>, chunking: ChunkingConfig, fail_transcribe: bool) -> Pipeline {
            Pipeline::with_components(
                self.cache.clone(),
                self.acquirer.clone(),
                Arc::new(FakeTranscriber { fail: fail_transcribe }),
                embedder,
                chunking,
                PathBuf::from("/tmp/earshot-test-work"),
            )
        }

        fn acquisitions(&self) -> usize {
            self.acquirer.calls.load(Ordering::SeqCst)
        }
    }

    fn source() -> SourceRef {
        SourceRef::new(ContentId::new("talk1"), SourceKind::Local, "/media/talk1.mp3")
    }

    fn chunking() -> ChunkingConfig {
        ChunkingConfig::new(24, 4).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_load_runs_every_stage_and_caches() {
        let setup = Setup::new();
        let pipeline = setup.pipeline(Arc::new(HashingEmbedder::new(32)), chunking(), false);
        let (reporter, stage) = StageReporter::channel(ItemState::Absent);

        let item = pipeline.load(&source(), &reporter).await.unwrap();

        assert_eq!(*stage.borrow(), ItemState::Indexing);
        assert_eq!(item.title(), "Talk talk1");
        assert!(!item.index().is_empty());
        assert_eq!(item.index().chunk(0).unwrap().start_seconds, Some(0.0));
        let cached = setup.cache.get(&ContentId::new("talk1")).unwrap().unwrap();
        assert_eq!(cached.index.as_ref(), Some(item.index().as_ref()));
    }

    #[tokio::test]
    async fn test_cached_item_skips_acquisition() {
        let setup = Setup::new();
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));
        setup
            .pipeline(embedder.clone(), chunking(), false)
            .load(&source(), &StageReporter::detached())
            .await
            .unwrap();

        // Transcription would fail now, so a second load must come from the cache.
        let item = setup
            .pipeline(embedder, chunking(), true)
            .load(&source(), &StageReporter::detached())
            .await
            .unwrap();

        assert_eq!(setup.acquisitions(), 1);
        assert_eq!(item.title(), "Talk talk1");
    }

    #[tokio::test]
    async fn test_changed_configuration_rebuilds_from_cached_transcript() {
        let setup = Setup::new();
        setup
            .pipeline(Arc::new(HashingEmbedder::new(32)), chunking(), false)
            .load(&source(), &StageReporter::detached())
            .await
            .unwrap();

        let other = ChunkingConfig::new(40, 10).unwrap();
        let item = setup
            .pipeline(Arc::new(HashingEmbedder::new(32)), other, true)
            .load(&source(), &StageReporter::detached())
            .await
            .unwrap();

        assert_eq!(setup.acquisitions(), 1);
        assert_eq!(item.index().fingerprint().chunk_size, 40);
        let cached = setup.cache.get(&ContentId::new("talk1")).unwrap().unwrap();
        assert_eq!(cached.index.unwrap().fingerprint().chunk_size, 40);
    }

    #[tokio::test]
    async fn test_transcription_failure_keeps_content_id_and_caches_nothing() {
        let setup = Setup::new();
        let err = setup
            .pipeline(Arc::new(HashingEmbedder::new(32)), chunking(), true)
            .load(&source(), &StageReporter::detached())
            .await
            .unwrap_err();

        assert!(matches!(&err, EarshotError::Transcription { content_id, .. } if content_id == "talk1"));
        assert!(setup.cache.get(&ContentId::new("talk1")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_acquisition_failure_is_reported_with_reason() {
        let setup = Setup {
            acquirer: Arc::new(FakeAcquirer {
                calls: AtomicUsize::new(0),
                fail: true,
            }),
            ..Setup::new()
        };
        let err = setup
            .pipeline(Arc::new(HashingEmbedder::new(32)), chunking(), false)
            .load(&source(), &StageReporter::detached())
            .await
            .unwrap_err();

        assert!(matches!(err, EarshotError::Acquisition { .. }));
        assert!(err.to_string().contains("private"));
    }

    #[tokio::test]
    async fn test_indexing_failure_is_partial_and_resumable() {
        let setup = Setup::new();
        let err = setup
            .pipeline(Arc::new(BrokenEmbedder), chunking(), false)
            .load(&source(), &StageReporter::detached())
            .await
            .unwrap_err();

        assert!(matches!(err, EarshotError::IndexingIncomplete { .. }));
        let cached = setup.cache.get(&ContentId::new("talk1")).unwrap().unwrap();
        assert!(cached.index.is_none());

        let item = setup
            .pipeline(Arc::new(HashingEmbedder::new(32)), chunking(), true)
            .load(&source(), &StageReporter::detached())
            .await
            .unwrap();
        assert_eq!(setup.acquisitions(), 1);
        assert!(!item.index().is_empty());
    }

    #[tokio::test]
    async fn test_reindex_updates_cache() {
        let setup = Setup::new();
        let pipeline = setup.pipeline(Arc::new(HashingEmbedder::new(32)), chunking(), false);
        let item = pipeline.load(&source(), &StageReporter::detached()).await.unwrap();

        let index = pipeline.reindex(&item).await.unwrap();
        assert_eq!(index.entries(), item.index().entries());
        assert!(setup.cache.get(item.id()).unwrap().unwrap().index.is_some());
    }
}
