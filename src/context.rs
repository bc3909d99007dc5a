//! The resource holder shared by ingestion and question answering.
//!
//! A [`RagContext`] owns the configuration, the chunker, and (once built)
//! the [`Components`]: embedder, vector store handle, and language model.
//! Components are built on first use by a [`ComponentFactory`] and reused
//! for the lifetime of the context.
//!
//! Ingestion borrows the context mutably, so a batch cannot overlap another
//! batch or a question within one process.

use std::sync::Arc;

use async_trait::async_trait;

use crate::answer::{self, AnswerResult};
use crate::chunk::TextSplitter;
use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::error::{RagError, Result};
use crate::ingest::IngestRun;
use crate::llm::{self, ChatModel};
use crate::loader::SourceBatch;
use crate::store::{self, VectorStore};

/// Constructed backends. Cheap to clone.
#[derive(Clone)]
pub struct Components {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub model: Arc<dyn ChatModel>,
}

/// Builds [`Components`] from configuration.
#[async_trait]
pub trait ComponentFactory: Send + Sync {
    async fn build(&self, config: &Config) -> anyhow::Result<Components>;
}

/// Builds the configured providers and opens the SQLite collection.
pub struct DefaultFactory;

#[async_trait]
impl ComponentFactory for DefaultFactory {
    async fn build(&self, config: &Config) -> anyhow::Result<Components> {
        let embedder = embedding::create_embedder(&config.embedding).await?;
        let store = store::open_store(&config.store).await?;
        let model = llm::create_model(&config.llm)?;
        Ok(Components {
            embedder,
            store,
            model,
        })
    }
}

pub struct RagContext {
    config: Config,
    splitter: TextSplitter,
    factory: Box<dyn ComponentFactory>,
    components: Option<Components>,
}

impl RagContext {
    /// A context using [`DefaultFactory`].
    pub fn new(config: Config) -> Result<Self> {
        Self::with_factory(config, DefaultFactory)
    }

    pub fn with_factory(config: Config, factory: impl ComponentFactory + 'static) -> Result<Self> {
        let splitter = TextSplitter::from_config(&config.chunking)?;
        Ok(Self {
            config,
            splitter,
            factory: Box::new(factory),
            components: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }

    pub fn is_initialized(&self) -> bool {
        self.components.is_some()
    }

    pub fn components(&self) -> Option<&Components> {
        self.components.as_ref()
    }

    /// Build the components if they do not exist yet.
    pub async fn initialize(&mut self) -> Result<&Components> {
        if self.components.is_none() {
            let built = self
                .factory
                .build(&self.config)
                .await
                .map_err(|e| {
                    RagError::Config(format!("failed to initialize components: {:#}", e))
                })?;
            tracing::info!(
                collection = built.store.collection(),
                embedder = built.embedder.model_name(),
                model = built.model.model_name(),
                "components initialized"
            );
            self.components = Some(built);
        }
        self.components.as_ref().ok_or(RagError::NotInitialized)
    }

    /// Attach to the persisted collection without ingesting anything.
    /// Returns the number of entries it holds.
    pub async fn open_existing(&mut self) -> Result<i64> {
        let components = self.initialize().await?;
        components.store.count().await.map_err(RagError::index)
    }

    /// Start an ingestion batch. With `reset`, the collection is emptied
    /// before the first unit is indexed; otherwise entries are appended.
    ///
    /// Nothing happens until the returned run is pulled.
    pub fn ingest(&mut self, batch: SourceBatch, reset: bool) -> IngestRun<'_> {
        IngestRun::new(self, batch, reset)
    }

    /// Answer a question from the indexed collection.
    pub async fn answer(&self, question: &str) -> Result<AnswerResult> {
        let question = answer::validate_question(question)?;
        let components = self.components.as_ref().ok_or(RagError::NotInitialized)?;
        answer::generate_answer(
            question,
            &self.config.retrieval,
            components.embedder.as_ref(),
            components.store.as_ref(),
            components.model.as_ref(),
        )
        .await
    }
}
