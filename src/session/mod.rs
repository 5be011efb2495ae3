//! Session registry: the bounded set of content items that are searchable now.
//!
//! At most `capacity` items are live at once; admitting a new item evicts the
//! least recently used one. Concurrent acquisitions of the same id share a
//! single in-flight load. Eviction only drops the in-memory item; cached
//! artifacts are left alone.

mod progress;

pub use progress::StageReporter;

use crate::content::{ContentId, ContentItem, ItemState, SourceRef};
use crate::embedding::Embedder;
use crate::error::{EarshotError, Result};
use crate::index::{self, Index, ScoredChunk};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use lru::LruCache;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Produces live content items for the registry.
#[async_trait]
pub trait ItemLoader: Send + Sync {
    /// Load (or build) the item for `source`, reporting stage changes.
    async fn load(&self, source: &SourceRef, progress: &StageReporter) -> Result<ContentItem>;

    /// Build a fresh index for an already loaded item.
    async fn reindex(&self, item: &ContentItem) -> Result<Index>;
}

type LoadResult = std::result::Result<Arc<ContentItem>, Arc<EarshotError>>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

struct InFlight {
    load: WeakShared<BoxFuture<'static, LoadResult>>,
    stage: watch::Receiver<ItemState>,
    generation: u64,
}

struct Inner {
    live: LruCache<ContentId, Arc<ContentItem>>,
    in_flight: HashMap<ContentId, InFlight>,
    /// Most recent failure reason per id, cleared when the id is acquired again.
    failures: LruCache<ContentId, String>,
    next_generation: u64,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the in-flight entry when a load is dropped before it finishes.
struct InFlightGuard {
    inner: Arc<Mutex<Inner>>,
    id: ContentId,
    generation: u64,
    armed: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = lock(&self.inner);
        if inner.in_flight.get(&self.id).map(|f| f.generation) == Some(self.generation) {
            inner.in_flight.remove(&self.id);
            debug!("Cancelled in-flight acquisition of {}", self.id);
        }
    }
}

/// Bounded, LRU-ordered registry of live content items.
pub struct SessionRegistry {
    capacity: NonZeroUsize,
    loader: Arc<dyn ItemLoader>,
    embedder: Arc<dyn Embedder>,
    inner: Arc<Mutex<Inner>>,
}

impl SessionRegistry {
    /// Create a registry holding at most `capacity` items.
    pub fn new(capacity: usize, loader: Arc<dyn ItemLoader>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            EarshotError::Config("session capacity must be positive".to_string())
        })?;

        Ok(Self {
            capacity,
            loader,
            embedder,
            inner: Arc::new(Mutex::new(Inner {
                live: LruCache::new(capacity),
                in_flight: HashMap::new(),
                failures: LruCache::new(capacity),
                next_generation: 0,
            })),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Number of live items.
    pub fn size(&self) -> usize {
        lock(&self.inner).live.len()
    }

    /// Return the live item for `source`, loading it if necessary.
    ///
    /// Callers acquiring the same id concurrently share one load and receive
    /// the same item or the same failure. Dropping every waiter cancels the
    /// load; nothing is registered in that case.
    #[instrument(skip(self), fields(content_id = %source.id))]
    pub async fn acquire(&self, source: &SourceRef) -> Result<Arc<ContentItem>> {
        let load = {
            let mut inner = lock(&self.inner);

            if let Some(item) = inner.live.get(&source.id) {
                debug!("Item already live");
                return Ok(item.clone());
            }

            match inner.in_flight.get(&source.id).and_then(|f| f.load.upgrade()) {
                Some(load) => {
                    debug!("Joining in-flight acquisition");
                    load
                }
                None => self.start_load(&mut inner, source),
            }
        };

        load.await.map_err(EarshotError::from_shared)
    }

    /// Like [`acquire`](Self::acquire), but gives up when `cancel` resolves first.
    ///
    /// Giving up detaches this caller only; the load keeps running while any
    /// other caller still waits on it.
    pub async fn acquire_until<C>(&self, source: &SourceRef, cancel: C) -> Result<Arc<ContentItem>>
    where
        C: Future,
    {
        tokio::select! {
            result = self.acquire(source) => result,
            _ = cancel => {
                info!("Acquisition of {} cancelled by caller", source.id);
                Err(EarshotError::Cancelled(source.id.to_string()))
            }
        }
    }

    fn start_load(&self, inner: &mut Inner, source: &SourceRef) -> SharedLoad {
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.failures.pop(&source.id);

        let (reporter, stage) = StageReporter::channel(ItemState::Acquiring);
        let loader = self.loader.clone();
        let registry = self.inner.clone();
        let key = source.id.clone();
        let source = source.clone();

        let load = async move {
            let mut guard = InFlightGuard {
                inner: registry.clone(),
                id: source.id.clone(),
                generation,
                armed: true,
            };

            let result = match loader.load(&source, &reporter).await {
                Ok(item) if item.id() != &source.id => Err(EarshotError::InvalidArgument(format!(
                    "loader returned {} for {}",
                    item.id(),
                    source.id
                ))),
                other => other,
            };

            let mut inner = lock(&registry);
            guard.armed = false;
            if inner.in_flight.get(&source.id).map(|f| f.generation) == Some(generation) {
                inner.in_flight.remove(&source.id);
            }

            match result {
                Ok(item) => {
                    let item = Arc::new(item);
                    if inner.live.len() == inner.live.cap().get() {
                        if let Some((evicted, _)) = inner.live.pop_lru() {
                            info!("Evicted least recently used item {}", evicted);
                        }
                    }
                    inner.live.put(source.id.clone(), item.clone());
                    reporter.report(ItemState::Ready);
                    info!("Item {} is ready ({} live)", source.id, inner.live.len());
                    Ok(item)
                }
                Err(e) => {
                    warn!("Acquisition of {} failed: {}", source.id, e);
                    inner.failures.put(source.id.clone(), e.to_string());
                    reporter.report(ItemState::Failed(e.to_string()));
                    Err(Arc::new(e))
                }
            }
        }
        .boxed()
        .shared();

        if let Some(weak) = load.downgrade() {
            inner.in_flight.insert(
                key,
                InFlight {
                    load: weak,
                    stage,
                    generation,
                },
            );
        }

        load
    }

    /// Mark a live item as used. Returns whether the item is live.
    pub fn touch(&self, id: &ContentId) -> bool {
        lock(&self.inner).live.get(id).is_some()
    }

    /// Look up a live item, counting as a use.
    pub fn get(&self, id: &ContentId) -> Option<Arc<ContentItem>> {
        lock(&self.inner).live.get(id).cloned()
    }

    /// Evict the least recently used item, returning its id.
    pub fn evict_lru(&self) -> Option<ContentId> {
        let evicted = lock(&self.inner).live.pop_lru().map(|(id, _)| id);
        if let Some(id) = &evicted {
            info!("Evicted least recently used item {}", id);
        }
        evicted
    }

    /// Evict a specific item. Returns whether it was live.
    pub fn evict(&self, id: &ContentId) -> bool {
        lock(&self.inner).live.pop(id).is_some()
    }

    /// Live item ids, most recently used first.
    pub fn ids_by_recency(&self) -> Vec<ContentId> {
        lock(&self.inner).live.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Live items, most recently used first, without affecting recency.
    pub fn items(&self) -> Vec<Arc<ContentItem>> {
        lock(&self.inner).live.iter().map(|(_, item)| item.clone()).collect()
    }

    /// Current processing state of an id.
    pub fn state(&self, id: &ContentId) -> ItemState {
        let inner = lock(&self.inner);
        if inner.live.contains(id) {
            ItemState::Ready
        } else if let Some(flight) = inner.in_flight.get(id) {
            flight.stage.borrow().clone()
        } else if let Some(reason) = inner.failures.peek(id) {
            ItemState::Failed(reason.clone())
        } else {
            ItemState::Absent
        }
    }

    /// Follow the stages of an in-flight acquisition.
    pub fn subscribe(&self, id: &ContentId) -> Option<watch::Receiver<ItemState>> {
        lock(&self.inner).in_flight.get(id).map(|f| f.stage.clone())
    }

    /// Top-k search within one live item. Counts as a use of that item.
    #[instrument(skip(self, query))]
    pub async fn search(&self, id: &ContentId, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let item = self
            .get(id)
            .ok_or_else(|| EarshotError::NotLoaded(id.to_string()))?;
        let index = item.index();
        index::search(self.embedder.as_ref(), &index, query, k).await
    }

    /// Rebuild a live item's index and publish it once complete.
    ///
    /// Searches keep using the previous index until the new one is swapped in;
    /// a failed rebuild leaves it in place.
    #[instrument(skip(self))]
    pub async fn reindex(&self, id: &ContentId) -> Result<Arc<Index>> {
        let item = self
            .get(id)
            .ok_or_else(|| EarshotError::NotLoaded(id.to_string()))?;
        let index = self.loader.reindex(&item).await?;
        item.replace_index(index);
        Ok(item.index())
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{chunk, ChunkingConfig};
    use crate::embedding::HashingEmbedder;
    use crate::index::build_index;
    use crate::content::SourceKind;
    use crate::transcription::Transcript;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::{Notify, Semaphore};

    /// Loader that builds items from canned text, optionally waiting on a gate.
    struct FakeLoader {
        embedder: HashingEmbedder,
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
        started: Arc<Notify>,
        dropped: Arc<AtomicBool>,
        failing: HashSet<String>,
        reindex_fails: AtomicBool,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl FakeLoader {
        fn new() -> Self {
            Self {
                embedder: HashingEmbedder::new(64),
                calls: AtomicUsize::new(0),
                gate: None,
                started: Arc::new(Notify::new()),
                dropped: Arc::new(AtomicBool::new(false)),
                failing: HashSet::new(),
                reindex_fails: AtomicBool::new(false),
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn build(&self, id: &ContentId, text: &str) -> Result<Index> {
            let config = ChunkingConfig::new(40, 8)?;
            let chunks = chunk(id, text, &config)?;
            build_index(&self.embedder, id, chunks, &config).await
        }
    }

    #[async_trait]
    impl ItemLoader for FakeLoader {
        async fn load(&self, source: &SourceRef, progress: &StageReporter) -> Result<ContentItem> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _flag = DropFlag(self.dropped.clone());
            progress.report(ItemState::Transcribing);
            self.started.notify_one();

            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            tokio::task::yield_now().await;

            if self.failing.contains(source.id.as_str()) {
                return Err(EarshotError::Acquisition {
                    content_id: source.id.to_string(),
                    source: Box::new(EarshotError::Source("restricted".into())),
                });
            }

            let text = format!("episode {} talks about {} at length", source.id, source.id);
            let transcript = Transcript::from_text(text.clone(), 60.0);
            let index = self.build(&source.id, &text).await?;
            Ok(ContentItem::new(source.id.clone(), source.id.to_string(), transcript, index))
        }

        async fn reindex(&self, item: &ContentItem) -> Result<Index> {
            if self.reindex_fails.load(Ordering::SeqCst) {
                return Err(EarshotError::Embedding("embedding backend went away".into()));
            }
            self.build(item.id(), &item.transcript().full_text).await
        }
    }

    fn source(id: &str) -> SourceRef {
        SourceRef::new(ContentId::new(id), SourceKind::YouTube, format!("https://youtu.be/{}", id))
    }

    fn registry(capacity: usize, loader: Arc<FakeLoader>) -> SessionRegistry {
        SessionRegistry::new(capacity, loader, Arc::new(HashingEmbedder::new(64))).unwrap()
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = SessionRegistry::new(0, Arc::new(FakeLoader::new()), Arc::new(HashingEmbedder::new(8)));
        assert!(matches!(result, Err(EarshotError::Config(_))));
    }

    #[tokio::test]
    async fn test_acquire_registers_item_once() {
        let loader = Arc::new(FakeLoader::new());
        let registry = registry(5, loader.clone());

        let first = registry.acquire(&source("a")).await.unwrap();
        let second = registry.acquire(&source("a")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.calls(), 1);
        assert_eq!(registry.size(), 1);
        assert_eq!(registry.state(&ContentId::new("a")), ItemState::Ready);
        assert_eq!(registry.state(&ContentId::new("zzz")), ItemState::Absent);
    }

    #[tokio::test]
    async fn test_lru_item_is_evicted_at_capacity() {
        let loader = Arc::new(FakeLoader::new());
        let registry = registry(2, loader);

        registry.acquire(&source("a")).await.unwrap();
        registry.acquire(&source("b")).await.unwrap();
        assert!(registry.touch(&ContentId::new("a")));
        registry.acquire(&source("c")).await.unwrap();

        assert_eq!(registry.size(), 2);
        assert_eq!(
            registry.ids_by_recency(),
            vec![ContentId::new("c"), ContentId::new("a")]
        );
        assert_eq!(registry.state(&ContentId::new("b")), ItemState::Absent);
    }

    #[tokio::test]
    async fn test_search_counts_as_use() {
        let loader = Arc::new(FakeLoader::new());
        let registry = registry(2, loader);

        registry.acquire(&source("a")).await.unwrap();
        registry.acquire(&source("b")).await.unwrap();
        let hits = registry.search(&ContentId::new("a"), "talks", 2).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.chunk.content_id.as_str() == "a"));

        registry.acquire(&source("c")).await.unwrap();
        assert!(registry.get(&ContentId::new("a")).is_some());
        assert!(registry.get(&ContentId::new("b")).is_none());
    }

    #[tokio::test]
    async fn test_search_unknown_item_is_not_loaded() {
        let registry = registry(2, Arc::new(FakeLoader::new()));
        let err = registry.search(&ContentId::new("ghost"), "q", 3).await.unwrap_err();
        assert!(matches!(err, EarshotError::NotLoaded(_)));
    }

    #[tokio::test]
    async fn test_concurrent_acquires_coalesce() {
        let gate = Arc::new(Semaphore::new(0));
        let loader = Arc::new(FakeLoader::gated(gate.clone()));
        let registry = Arc::new(registry(5, loader.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.acquire(&source("shared")).await })
            })
            .collect();

        loader.started.notified().await;
        assert_eq!(registry.state(&ContentId::new("shared")), ItemState::Transcribing);
        gate.add_permits(1);

        let items: Vec<Arc<ContentItem>> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|h| h.unwrap().unwrap())
            .collect();

        assert_eq!(loader.calls(), 1);
        assert!(items.iter().all(|i| Arc::ptr_eq(i, &items[0])));
        assert_eq!(registry.size(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_retryable() {
        let mut loader = FakeLoader::new();
        loader.failing.insert("bad".to_string());
        let loader = Arc::new(loader);
        let registry = registry(5, loader.clone());

        let (first, second) = (source("bad"), source("bad"));
        let (a, b) = tokio::join!(registry.acquire(&first), registry.acquire(&second));
        for result in [a, b] {
            let err = result.unwrap_err();
            assert!(matches!(err.root(), EarshotError::Acquisition { .. }));
        }
        assert_eq!(loader.calls(), 1);
        assert_eq!(registry.size(), 0);
        assert!(matches!(registry.state(&ContentId::new("bad")), ItemState::Failed(_)));

        assert!(registry.acquire(&source("bad")).await.is_err());
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_acquisition_registers_nothing() {
        let gate = Arc::new(Semaphore::new(0));
        let loader = Arc::new(FakeLoader::gated(gate.clone()));
        let registry = Arc::new(registry(5, loader.clone()));

        let task = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.acquire(&source("slow")).await })
        };
        loader.started.notified().await;
        assert!(registry.subscribe(&ContentId::new("slow")).is_some());

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(loader.dropped.load(Ordering::SeqCst));
        assert_eq!(registry.size(), 0);
        assert_eq!(registry.state(&ContentId::new("slow")), ItemState::Absent);

        // A later acquire starts a fresh load.
        gate.add_permits(1);
        registry.acquire(&source("slow")).await.unwrap();
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test]
    async fn test_acquire_until_detaches_caller() {
        let gate = Arc::new(Semaphore::new(0));
        let loader = Arc::new(FakeLoader::gated(gate));
        let registry = registry(5, loader);

        let result = registry
            .acquire_until(&source("slow"), tokio::time::sleep(std::time::Duration::from_millis(20)))
            .await;

        assert!(matches!(result, Err(EarshotError::Cancelled(_))));
        assert_eq!(registry.size(), 0);
        assert_eq!(registry.state(&ContentId::new("slow")), ItemState::Absent);
    }

    #[tokio::test]
    async fn test_evict_and_evict_lru() {
        let registry = registry(3, Arc::new(FakeLoader::new()));
        for id in ["a", "b", "c"] {
            registry.acquire(&source(id)).await.unwrap();
        }

        assert_eq!(registry.evict_lru(), Some(ContentId::new("a")));
        assert!(registry.evict(&ContentId::new("c")));
        assert!(!registry.evict(&ContentId::new("c")));
        assert_eq!(registry.ids_by_recency(), vec![ContentId::new("b")]);
    }

    #[tokio::test]
    async fn test_reindex_publishes_new_index() {
        let registry = registry(2, Arc::new(FakeLoader::new()));
        let item = registry.acquire(&source("a")).await.unwrap();
        let before = item.index();

        let rebuilt = registry.reindex(&ContentId::new("a")).await.unwrap();

        assert!(!Arc::ptr_eq(&before, &rebuilt));
        assert_eq!(before.entries(), rebuilt.entries());
        assert!(Arc::ptr_eq(&item.index(), &rebuilt));
    }

    #[tokio::test]
    async fn test_failed_reindex_keeps_prior_index() {
        let loader = Arc::new(FakeLoader::new());
        let registry = registry(2, loader.clone());
        let item = registry.acquire(&source("a")).await.unwrap();
        let before = item.index();

        loader.reindex_fails.store(true, Ordering::SeqCst);
        let err = registry.reindex(&ContentId::new("a")).await.unwrap_err();

        assert!(matches!(err, EarshotError::Embedding(_)));
        assert!(Arc::ptr_eq(&before, &item.index()));
        let hits = registry.search(&ContentId::new("a"), "talks", 2).await.unwrap();
        assert!(!hits.is_empty());
    }
}
