//! Storage seams used by the sync engine and their Qdrant implementations.
//!
//! - [`VectorStore`]: batch upsert of data points, existence lookup
//! - [`GraphStore`]: relationship edge upsert
//! - [`IndexMaintainer`]: payload index creation
//!
//! All three write to the same shared collection.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use nexsync_models::{RelationshipEdge, SchemaField};
use nexsync_qdrant::{PayloadIndexKind, QdrantService};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

pub use nexsync_qdrant::VectorPoint;

use super::cache::CacheInvalidator;
use super::embeddings::{EmbedMode, Embedder};
use super::identity::{derive_graph_identity, PointKind};
use super::transform::{FK_IDENTITY_SUFFIX, FK_ID_SUFFIX};
use crate::error::{Error, Result};

/// Point payload key names
pub const KEY_POINT_ID: &str = "point_id";
pub const KEY_POINT_TYPE: &str = "point_type";
pub const KEY_RECORD_ID: &str = "record_id";
pub const KEY_MODEL_NAME: &str = "model_name";
pub const KEY_MODEL_ID: &str = "model_id";
pub const KEY_VECTOR_TEXT: &str = "vector_text";
pub const KEY_SYNC_TIMESTAMP: &str = "sync_timestamp";

/// Writes data points; idempotent on point id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()>;

    /// Subset of `ids` already present in the store
    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>>;
}

/// Writes relationship edges; idempotent on (source model, field).
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_edge(&self, edge: &RelationshipEdge) -> Result<()>;
}

/// Keeps secondary payload indexes in place for a model's fields.
#[async_trait]
pub trait IndexMaintainer: Send + Sync {
    /// Returns how many indexes were newly created
    async fn ensure_indexes(&self, model_name: &str, fields: &[SchemaField]) -> Result<usize>;
}

/// Current time as stored in `sync_timestamp`
pub fn sync_timestamp() -> String {
    Utc::now().to_rfc3339()
}

// ============================================================================
// Qdrant implementations
// ============================================================================

/// Data point storage in the shared Qdrant collection.
#[derive(Clone)]
pub struct QdrantVectorStore {
    qdrant: QdrantService,
}

impl QdrantVectorStore {
    pub fn new(qdrant: QdrantService) -> Self {
        Self { qdrant }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()> {
        Ok(self.qdrant.upsert_batch(points).await?)
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        Ok(self.qdrant.existing_ids(ids).await?)
    }
}

/// Relationship edges stored as `point_type = "graph"` points.
///
/// Each edge is embedded from its descriptive sentence so relationships are
/// searchable next to the data they connect.
pub struct QdrantGraphStore {
    qdrant: QdrantService,
    embedder: Arc<dyn Embedder>,
}

impl QdrantGraphStore {
    pub fn new(qdrant: QdrantService, embedder: Arc<dyn Embedder>) -> Self {
        Self { qdrant, embedder }
    }
}

#[async_trait]
impl GraphStore for QdrantGraphStore {
    async fn upsert_edge(&self, edge: &RelationshipEdge) -> Result<()> {
        let id = derive_graph_identity(edge.source_model_id, edge.field_id)?.to_string();
        let text = edge.describe();

        let vector = self
            .embedder
            .embed(vec![text.clone()], EmbedMode::Document)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::GraphStore("No embedding returned for edge".to_string()))?;

        let mut payload = match serde_json::to_value(edge)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        payload.insert(KEY_POINT_ID.to_string(), Value::String(id.clone()));
        payload.insert(
            KEY_POINT_TYPE.to_string(),
            Value::String(PointKind::Graph.as_str().to_string()),
        );
        payload.insert(KEY_VECTOR_TEXT.to_string(), Value::String(text));
        payload.insert(KEY_SYNC_TIMESTAMP.to_string(), Value::String(sync_timestamp()));

        self.qdrant
            .upsert_batch(vec![VectorPoint {
                id,
                vector,
                payload,
            }])
            .await
            .map_err(|e| Error::GraphStore(e.to_string()))
    }
}

/// Payload indexes on system keys and FK-derived keys.
///
/// Remembers which indexes it already created this process so repeated
/// syncs of a model don't reissue them.
pub struct QdrantIndexMaintainer {
    qdrant: QdrantService,
    created: RwLock<HashSet<String>>,
}

impl QdrantIndexMaintainer {
    pub fn new(qdrant: QdrantService) -> Self {
        Self {
            qdrant,
            created: RwLock::new(HashSet::new()),
        }
    }
}

/// Indexes wanted for a model: system keys plus two per many2one field.
pub fn wanted_indexes(fields: &[SchemaField]) -> Vec<(String, PayloadIndexKind)> {
    let mut wanted = vec![
        (KEY_POINT_TYPE.to_string(), PayloadIndexKind::Keyword),
        (KEY_MODEL_NAME.to_string(), PayloadIndexKind::Keyword),
        (KEY_MODEL_ID.to_string(), PayloadIndexKind::Integer),
        (KEY_RECORD_ID.to_string(), PayloadIndexKind::Integer),
    ];
    for field in fields.iter().filter(|f| f.is_many2one()) {
        wanted.push((
            format!("{}{}", field.field_name, FK_ID_SUFFIX),
            PayloadIndexKind::Integer,
        ));
        if field.fk_location_model_id.is_some() {
            wanted.push((
                format!("{}{}", field.field_name, FK_IDENTITY_SUFFIX),
                PayloadIndexKind::Keyword,
            ));
        }
    }
    wanted
}

#[async_trait]
impl IndexMaintainer for QdrantIndexMaintainer {
    async fn ensure_indexes(&self, model_name: &str, fields: &[SchemaField]) -> Result<usize> {
        let mut created = 0;

        for (field, kind) in wanted_indexes(fields) {
            if self.created.read().await.contains(&field) {
                continue;
            }
            self.qdrant.create_payload_index(&field, kind).await?;
            self.created.write().await.insert(field);
            created += 1;
        }

        debug!(model = %model_name, created, "Payload indexes ensured");
        Ok(created)
    }
}

#[async_trait]
impl CacheInvalidator for QdrantIndexMaintainer {
    fn name(&self) -> &str {
        "payload_indexes"
    }

    async fn invalidate(&self) {
        self.created.write().await.clear();
    }
}
