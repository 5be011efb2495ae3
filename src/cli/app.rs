//! Wiring of settings into a ready-to-use registry and question engine.

use crate::cache::{create_cache, ArtifactCache};
use crate::config::{Prompts, Settings};
use crate::content::{ContentItem, ItemState, SourceRef};
use crate::embedding::create_embedder;
use crate::error::Result;
use crate::generation::{Generator, OllamaGenerator};
use crate::pipeline::Pipeline;
use crate::rag::{ContextAssembler, QaEngine};
use crate::session::SessionRegistry;
use crate::source::parse_input;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{preflight, Output};

/// Everything a command needs, built once from settings.
pub struct App {
    settings: Settings,
    cache: Arc<dyn ArtifactCache>,
    registry: Arc<SessionRegistry>,
    engine: Arc<QaEngine>,
}

impl App {
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        std::fs::create_dir_all(settings.temp_dir())?;

        let cache = create_cache(&settings)?;
        let embedder = create_embedder(&settings.embedding)?;
        let pipeline = Pipeline::from_settings(&settings, cache.clone(), embedder.clone())?;
        let registry = Arc::new(SessionRegistry::new(
            settings.session.max_items,
            Arc::new(pipeline),
            embedder,
        )?);

        let generator: Arc<dyn Generator> = Arc::new(OllamaGenerator::new(&settings.generation)?);
        let assembler = ContextAssembler::from_settings(&settings, prompts);
        let engine = Arc::new(QaEngine::new(
            registry.clone(),
            generator,
            assembler,
            settings.retrieval.top_k,
        ));

        info!(
            "Using {} embeddings and {} for generation",
            settings.embedding.model, settings.generation.model
        );

        Ok(Self {
            settings,
            cache,
            registry,
            engine,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<dyn ArtifactCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<QaEngine> {
        &self.engine
    }

    /// Resolve an input and load it with a stage spinner.
    ///
    /// Ctrl+C abandons the load.
    pub async fn load(&self, input: &str) -> Result<(SourceRef, Arc<ContentItem>)> {
        let source = parse_input(input)?;
        if !self.registry.ids_by_recency().contains(&source.id) && self.cache.get(&source.id)?.is_none() {
            preflight::check(source.kind, &self.settings).await?;
        }

        let spinner = Output::spinner(&format!("Loading {}...", source.id));

        let load = self
            .registry
            .acquire_until(&source, interrupted(tokio::signal::ctrl_c()));
        tokio::pin!(load);

        // The stage channel only exists once the load has been polled.
        let mut stages = None;
        let mut subscribed = false;
        let result = loop {
            if !subscribed {
                stages = self.registry.subscribe(&source.id);
                subscribed = stages.is_some();
            }

            match stages.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        result = &mut load => break result,
                        changed = rx.changed() => match changed {
                            Ok(()) => {
                                let state = rx.borrow_and_update().clone();
                                spinner.set_message(stage_message(&source, &state));
                            }
                            Err(_) => stages = None,
                        },
                    }
                }
                None if subscribed => break (&mut load).await,
                None => {
                    tokio::select! {
                        result = &mut load => break result,
                        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                    }
                }
            }
        };

        spinner.finish_and_clear();
        let item = result?;
        Ok((source.clone(), item))
    }
}

/// Resolves when `signal` fires. A signal that cannot be listened for never fires.
async fn interrupted<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn stage_message(source: &SourceRef, state: &ItemState) -> String {
    match state {
        ItemState::Acquiring => format!("Fetching {} media...", source.kind),
        ItemState::Transcribing => "Transcribing audio (this can take a while)...".to_string(),
        ItemState::Indexing => "Building the search index...".to_string(),
        other => format!("{}: {}", source.id, other),
    }
}
