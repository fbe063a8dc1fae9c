//! Service layer for nexsync.
//!
//! Pure record handling:
//! - Identity (deterministic point ids)
//! - FK extraction (scalar, tuple, expanded shapes)
//! - Transform (semantic text and payload)
//! - Collector (cascade targets)
//!
//! Collaborator seams and their adapters:
//! - Schema (registry of models and fields)
//! - Source (raw record files)
//! - Embeddings (vector generation)
//! - Stores (vector points, graph edges, payload indexes)
//! - Cache (central invalidation)
//!
//! Orchestration:
//! - Pipeline (batched embed/upsert)
//! - Graph (relationship edges)
//! - Sync (per-model sync and one-hop cascade)

mod cache;
mod collector;
mod embeddings;
mod fk;
mod graph;
mod identity;
mod pipeline;
mod schema;
mod source;
mod stores;
mod sync;
mod transform;

pub use cache::{CacheInvalidator, Caches};
pub use collector::collect_fk_targets;
pub use embeddings::{EmbedMode, Embedder};
pub use fk::{extract_fk, lookup, parse_positive_id};
pub use graph::{build_edges, GraphEdgeUpdater, GraphUpdate};
pub use identity::{
    derive_data_identity, derive_graph_identity, derive_schema_identity, Identity, PointKind,
};
pub use nexsync_embeddings::{EmbeddingConfig, EmbeddingProviderConfig, EmbeddingService};
pub use nexsync_qdrant::QdrantService;
pub use pipeline::{BatchPipeline, PipelineOutcome};
pub use schema::{JsonSchemaRegistry, SchemaRegistry, SchemaRow};
pub use source::{JsonRecordSource, RecordSource};
pub use stores::{
    sync_timestamp, wanted_indexes, GraphStore, IndexMaintainer, QdrantGraphStore,
    QdrantIndexMaintainer, QdrantVectorStore, VectorPoint, VectorStore, KEY_MODEL_ID,
    KEY_MODEL_NAME, KEY_POINT_ID, KEY_POINT_TYPE, KEY_RECORD_ID, KEY_SYNC_TIMESTAMP,
    KEY_VECTOR_TEXT,
};
pub use sync::{resolve_model_name, CascadeState, SyncEngine};
pub use transform::{transform_records, FK_IDENTITY_SUFFIX, FK_ID_SUFFIX};
