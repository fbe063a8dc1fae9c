//! Qdrant service for vector storage.
//!
//! All synced models share one collection. Data, schema and graph points are
//! told apart by their `point_type` payload key, and point ids are
//! deterministic UUID strings so re-syncs overwrite rather than duplicate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use qdrant_client::qdrant::{
    point_id::PointIdOptions, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    Distance, FieldType, GetPointsBuilder, PointId, PointStruct, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Error types for the Qdrant service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Vector store error: {0}")]
    VectorStore(String),
}

/// Result type for the Qdrant service.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration for the Qdrant service.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
}

impl QdrantConfig {
    /// Create a new Qdrant configuration.
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            collection: collection.into(),
        }
    }
}

/// A point to write: deterministic id, dense vector, JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

/// Payload index schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadIndexKind {
    Keyword,
    Integer,
}

impl PayloadIndexKind {
    fn field_type(&self) -> FieldType {
        match self {
            PayloadIndexKind::Keyword => FieldType::Keyword,
            PayloadIndexKind::Integer => FieldType::Integer,
        }
    }
}

/// Collection information
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub name: String,
    pub exists: bool,
    pub points_count: u64,
    pub dimension: usize,
}

/// Service for vector storage using Qdrant.
#[derive(Clone)]
pub struct QdrantService {
    inner: Arc<QdrantServiceInner>,
}

struct QdrantServiceInner {
    client: Qdrant,
    collection: String,
}

impl QdrantService {
    /// Connect to Qdrant and verify the connection.
    pub async fn new(config: &QdrantConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .build()
            .map_err(|e| Error::VectorStore(format!("Failed to connect to Qdrant: {}", e)))?;

        client
            .list_collections()
            .await
            .map_err(|e| Error::VectorStore(format!("Qdrant connection test failed: {}", e)))?;

        info!(url = %config.url, collection = %config.collection, "Qdrant service connected");

        Ok(Self {
            inner: Arc::new(QdrantServiceInner {
                client,
                collection: config.collection.clone(),
            }),
        })
    }

    /// Name of the shared collection
    pub fn collection_name(&self) -> &str {
        &self.inner.collection
    }

    /// Create the collection if it doesn't exist.
    ///
    /// An existing collection with a different dimension is an error: it holds
    /// other models' data, so it is never dropped implicitly.
    pub async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let info = self.collection_info().await?;

        if info.exists {
            if info.dimension == dimension {
                debug!(collection = %info.name, dimension, "Collection already exists");
                return Ok(());
            }
            return Err(Error::VectorStore(format!(
                "Collection {} has dimension {} but embeddings have dimension {}",
                info.name, info.dimension, dimension
            )));
        }

        self.inner
            .client
            .create_collection(
                CreateCollectionBuilder::new(&self.inner.collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to create collection: {}", e)))?;

        info!(collection = %self.inner.collection, dimension, "Created Qdrant collection");

        Ok(())
    }

    /// Upsert multiple points as one write.
    pub async fn upsert_batch(&self, points: Vec<VectorPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let qdrant_points: Vec<PointStruct> = points
            .into_iter()
            .map(|point| {
                let payload: HashMap<String, QdrantValue> = point
                    .payload
                    .into_iter()
                    .filter_map(|(k, v)| json_to_qdrant_value(v).map(|qv| (k, qv)))
                    .collect();

                PointStruct::new(point.id, point.vector, payload)
            })
            .collect();

        let count = qdrant_points.len();

        self.inner
            .client
            .upsert_points(UpsertPointsBuilder::new(&self.inner.collection, qdrant_points).wait(true))
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to upsert points: {}", e)))?;

        debug!(collection = %self.inner.collection, count, "Upserted points");

        Ok(())
    }

    /// Return the subset of `ids` that already exist in the collection.
    pub async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let point_ids: Vec<PointId> = ids.iter().cloned().map(PointId::from).collect();

        let response = self
            .inner
            .client
            .get_points(
                GetPointsBuilder::new(&self.inner.collection, point_ids)
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to retrieve points: {}", e)))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| point.id.and_then(point_id_to_string))
            .collect())
    }

    /// Create a payload index. Qdrant treats re-creation as a no-op.
    pub async fn create_payload_index(&self, field: &str, kind: PayloadIndexKind) -> Result<()> {
        self.inner
            .client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(
                    &self.inner.collection,
                    field,
                    kind.field_type(),
                )
                .wait(true),
            )
            .await
            .map_err(|e| {
                Error::VectorStore(format!("Failed to create payload index on {}: {}", field, e))
            })?;

        debug!(collection = %self.inner.collection, field, kind = ?kind, "Created payload index");

        Ok(())
    }

    /// Get collection info.
    pub async fn collection_info(&self) -> Result<CollectionInfo> {
        let collection_name = self.inner.collection.clone();

        let exists = self
            .inner
            .client
            .collection_exists(&collection_name)
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to check collection: {}", e)))?;

        if !exists {
            return Ok(CollectionInfo {
                name: collection_name,
                exists: false,
                points_count: 0,
                dimension: 0,
            });
        }

        let info = self
            .inner
            .client
            .collection_info(&collection_name)
            .await
            .map_err(|e| Error::VectorStore(format!("Failed to get collection info: {}", e)))?;

        let dim = info
            .result
            .as_ref()
            .and_then(|r| r.config.as_ref())
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|vc| match vc.config.as_ref() {
                Some(qdrant_client::qdrant::vectors_config::Config::Params(params)) => {
                    Some(params.size as usize)
                }
                _ => None,
            })
            .unwrap_or(0);

        Ok(CollectionInfo {
            name: collection_name,
            exists: true,
            points_count: info
                .result
                .and_then(|r| r.points_count)
                .unwrap_or(0),
            dimension: dim,
        })
    }
}

fn point_id_to_string(id: PointId) -> Option<String> {
    match id.point_id_options {
        Some(PointIdOptions::Uuid(uuid)) => Some(uuid),
        Some(PointIdOptions::Num(num)) => Some(num.to_string()),
        None => None,
    }
}

/// Convert JSON value to Qdrant value
fn json_to_qdrant_value(value: Value) -> Option<QdrantValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(QdrantValue::from(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(QdrantValue::from(i))
            } else {
                n.as_f64().map(QdrantValue::from)
            }
        }
        Value::String(s) => Some(QdrantValue::from(s)),
        Value::Array(arr) => {
            let values: Vec<QdrantValue> =
                arr.into_iter().filter_map(json_to_qdrant_value).collect();
            if values.is_empty() {
                None
            } else {
                Some(QdrantValue::from(values))
            }
        }
        // Nested objects (expanded FK values) are stored as JSON text
        Value::Object(_) => Some(QdrantValue::from(value.to_string())),
    }
}
