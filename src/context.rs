//! Shared, read-only application state.
//!
//! An [`AppContext`] is built once at startup and passed by reference to every
//! request. Nothing in it is mutated after construction except the vector
//! index, which synchronizes internally.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::{validate, Config};
use crate::embedding::{create_provider, DisabledProvider, EmbeddingProvider};
use crate::generate::{create_generator, DisabledGenerator, TextGenerator};
use crate::index::{InMemoryIndex, SqliteIndex, VectorIndex};
use crate::ingest::{sync_documents, IngestSummary};
use crate::tables::TabularStore;

pub struct AppContext {
    pub config: Config,
    pub tables: TabularStore,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn TextGenerator>,
}

impl AppContext {
    /// Load tables, open the index and build the provider clients.
    ///
    /// Only an invalid config is an error. A missing spreadsheet leaves its
    /// table empty, an unopenable index file falls back to memory, and a
    /// provider that cannot be built (usually a missing API key) is replaced
    /// by its disabled variant. Each degradation is logged.
    pub async fn load(config: Config) -> Result<Self> {
        validate(&config)?;

        let tables = TabularStore::load(&config.tables);
        info!(
            districts = tables.districts().len(),
            talukas = tables.talukas().len(),
            "tables loaded"
        );

        let index: Arc<dyn VectorIndex> = match &config.index.path {
            Some(path) => match SqliteIndex::open(path).await {
                Ok(index) => Arc::new(index),
                Err(e) => {
                    warn!(path = %path.display(), error = %format!("{:#}", e), "vector index unavailable; using in-memory index");
                    Arc::new(InMemoryIndex::new())
                }
            },
            None => Arc::new(InMemoryIndex::new()),
        };

        let embedder: Arc<dyn EmbeddingProvider> = match create_provider(&config.embedding) {
            Ok(p) => p,
            Err(e) => {
                warn!(provider = %config.embedding.provider, error = %e, "embedding provider unavailable; document search disabled");
                Arc::new(DisabledProvider)
            }
        };

        let generator: Arc<dyn TextGenerator> = match create_generator(&config.generation) {
            Ok(g) => g,
            Err(e) => {
                warn!(provider = %config.generation.provider, error = %e, "generation provider unavailable");
                Arc::new(DisabledGenerator)
            }
        };

        let ctx = Self::from_parts(config, tables, index, embedder, generator);

        if ctx.config.documents.ingest_on_startup {
            match ctx.ingest().await {
                Ok(summary) if !summary.is_clean() => {
                    warn!(failed = summary.failed.len(), "some documents were not indexed")
                }
                Ok(_) => {}
                Err(e) => warn!(error = %format!("{:#}", e), "startup ingestion skipped"),
            }
        }

        Ok(ctx)
    }

    pub fn from_parts(
        config: Config,
        tables: TabularStore,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            config,
            tables,
            index,
            embedder,
            generator,
        }
    }

    /// Ingest everything under `documents.root` into this context's index.
    pub async fn ingest(&self) -> Result<IngestSummary> {
        sync_documents(&self.config, self.index.as_ref(), self.embedder.as_ref()).await
    }
}
