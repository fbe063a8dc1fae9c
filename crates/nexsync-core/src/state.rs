//! Application state for nexsync.
//!
//! Contains the shared state that is passed to all handlers.

use std::sync::Arc;

use crate::services::{
    Caches, EmbeddingService, Embedder, JsonRecordSource, JsonSchemaRegistry, QdrantGraphStore,
    QdrantIndexMaintainer, QdrantService, QdrantVectorStore, SyncEngine,
};
use crate::{config, Result};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Sync and cascade engine.
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    /// Create a new application state, connecting to Qdrant and wiring the
    /// file-backed registry and record source.
    pub async fn new() -> Result<Self> {
        let config = config::config();

        let embeddings = Arc::new(EmbeddingService::from_config(&config.embedding)?);
        if !embeddings.has_providers().await {
            tracing::warn!("No embedding providers configured, using hash placeholder vectors");
        }

        let qdrant = QdrantService::new(&nexsync_qdrant::QdrantConfig::new(
            &config.qdrant.url,
            &config.qdrant.collection,
        ))
        .await?;
        qdrant.ensure_collection(embeddings.dimension()).await?;

        let schema = Arc::new(JsonSchemaRegistry::new(&config.sync.schema_path));
        let source = Arc::new(JsonRecordSource::new(&config.sync.data_dir));
        let indexes = Arc::new(QdrantIndexMaintainer::new(qdrant.clone()));
        let embedder: Arc<dyn Embedder> = embeddings;

        let caches = Caches::new()
            .register(schema.clone())
            .register(indexes.clone());

        let engine = SyncEngine::new(
            schema,
            source,
            embedder.clone(),
            Arc::new(QdrantVectorStore::new(qdrant.clone())),
            Arc::new(QdrantGraphStore::new(qdrant, embedder)),
            indexes,
        )
        .with_batch_size(config.sync.batch_size)
        .with_caches(caches);

        Ok(Self::from_engine(engine))
    }

    /// Wrap an already-built engine.
    pub fn from_engine(engine: SyncEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}
