//! Common test utilities and in-memory collaborators.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use nexsync_core::services::{
    CacheInvalidator, Caches, EmbedMode, Embedder, GraphStore, IndexMaintainer, RecordSource,
    SchemaRegistry, SyncEngine, VectorPoint, VectorStore,
};
use nexsync_core::{Error, Result};
use nexsync_models::{FieldType, RawRecord, RelationshipEdge, SchemaField};
use serde_json::Value;

// ============================================================================
// HTTP helpers
// ============================================================================

/// Extract JSON body from response
pub async fn extract_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Create a GET request
pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Create a POST request with a raw body
pub fn post_raw(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// Schema and record builders
// ============================================================================

pub fn field(id: i64, name: &str, label: &str, field_type: FieldType) -> SchemaField {
    SchemaField {
        field_id: id,
        field_name: name.to_string(),
        field_label: label.to_string(),
        field_type,
        fk_location_model: None,
        fk_location_model_id: None,
    }
}

pub fn fk_field(id: i64, name: &str, label: &str, target: &str, target_id: i64) -> SchemaField {
    SchemaField {
        fk_location_model: Some(target.to_string()),
        fk_location_model_id: Some(target_id),
        ..field(id, name, label, FieldType::Many2one)
    }
}

pub fn record(value: Value) -> RawRecord {
    value.as_object().cloned().expect("record must be an object")
}

/// `n` records with ids 1..=n and a name field
pub fn numbered_records(n: usize) -> Vec<RawRecord> {
    (1..=n)
        .map(|i| record(serde_json::json!({"id": i, "name": format!("Record {}", i)})))
        .collect()
}

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
pub struct StaticSchema {
    models: Vec<(String, i64, Vec<SchemaField>)>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, name: &str, id: i64, fields: Vec<SchemaField>) -> Self {
        self.models.push((name.to_string(), id, fields));
        self
    }

    fn find(&self, name: &str) -> Option<&(String, i64, Vec<SchemaField>)> {
        self.models.iter().find(|(n, _, _)| n == name)
    }
}

#[async_trait]
impl SchemaRegistry for StaticSchema {
    async fn model_exists(&self, model_name: &str) -> Result<bool> {
        Ok(self.find(model_name).is_some())
    }

    async fn model_id(&self, model_name: &str) -> Result<Option<i64>> {
        Ok(self.find(model_name).map(|(_, id, _)| *id))
    }

    async fn model_fields(&self, model_name: &str) -> Result<Vec<SchemaField>> {
        Ok(self
            .find(model_name)
            .map(|(_, _, fields)| fields.clone())
            .unwrap_or_default())
    }

    async fn model_names(&self) -> Result<Vec<String>> {
        Ok(self.models.iter().map(|(n, _, _)| n.clone()).collect())
    }
}

/// Records keyed by model name; files keyed by stem for discovery.
#[derive(Default)]
pub struct MemorySource {
    files: BTreeMap<String, Vec<RawRecord>>,
    pub loads: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, stem: &str, records: Vec<RawRecord>) -> Self {
        self.files.insert(stem.to_string(), records);
        self
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn load(&self, model_name: &str, file_path: Option<&str>) -> Result<Vec<RawRecord>> {
        self.loads.lock().unwrap().push(model_name.to_string());
        let key = file_path
            .map(str::to_string)
            .unwrap_or_else(|| model_name.to_string());
        self.files
            .get(&key)
            .or_else(|| self.files.get(&key.replace('.', "_")))
            .cloned()
            .ok_or(Error::FileNotFound(key))
    }

    async fn discover(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }
}

/// Embeds each text as `[len, 1.0]`. Calls are numbered from 1.
#[derive(Default)]
pub struct ScriptedEmbedder {
    pub batches: Mutex<Vec<usize>>,
    fail_call: Option<usize>,
    short_call: Option<usize>,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_call: Some(call),
            ..Self::default()
        }
    }

    pub fn short_on(call: usize) -> Self {
        Self {
            short_call: Some(call),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    async fn embed(&self, texts: Vec<String>, _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        let call = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(texts.len());
            batches.len()
        };
        if self.fail_call == Some(call) {
            return Err(Error::Embedding("provider unavailable".to_string()));
        }
        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect();
        if self.short_call == Some(call) {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        2
    }
}

/// Points keyed by id, plus a log of upsert batch sizes.
#[derive(Default)]
pub struct RecordingStore {
    pub points: Mutex<HashMap<String, VectorPoint>>,
    pub writes: Mutex<Vec<usize>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_point(self, id: &str) -> Self {
        self.points.lock().unwrap().insert(
            id.to_string(),
            VectorPoint {
                id: id.to_string(),
                vector: vec![0.0, 0.0],
                payload: Default::default(),
            },
        );
        self
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.points.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn point(&self, id: &str) -> Option<VectorPoint> {
        self.points.lock().unwrap().get(id).cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()> {
        self.writes.lock().unwrap().push(points.len());
        let mut stored = self.points.lock().unwrap();
        for point in points {
            stored.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        let stored = self.points.lock().unwrap();
        Ok(ids.iter().filter(|id| stored.contains_key(*id)).cloned().collect())
    }
}

#[derive(Default)]
pub struct RecordingGraph {
    pub edges: Mutex<Vec<RelationshipEdge>>,
}

impl RecordingGraph {
    pub fn edges(&self) -> Vec<RelationshipEdge> {
        self.edges.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphStore for RecordingGraph {
    async fn upsert_edge(&self, edge: &RelationshipEdge) -> Result<()> {
        self.edges.lock().unwrap().push(edge.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingIndexes {
    pub models: Mutex<Vec<String>>,
}

impl RecordingIndexes {
    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexMaintainer for RecordingIndexes {
    async fn ensure_indexes(&self, model_name: &str, _fields: &[SchemaField]) -> Result<usize> {
        self.models.lock().unwrap().push(model_name.to_string());
        Ok(0)
    }
}

#[derive(Default)]
pub struct CountingCache {
    pub invalidations: AtomicUsize,
}

impl CountingCache {
    pub fn count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheInvalidator for CountingCache {
    fn name(&self) -> &str {
        "counting"
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Every collaborator of an engine, kept for assertions.
pub struct Harness {
    pub schema: Arc<StaticSchema>,
    pub source: Arc<MemorySource>,
    pub embedder: Arc<ScriptedEmbedder>,
    pub store: Arc<RecordingStore>,
    pub graph: Arc<RecordingGraph>,
    pub indexes: Arc<RecordingIndexes>,
    pub cache: Arc<CountingCache>,
}

impl Harness {
    pub fn new(schema: StaticSchema, source: MemorySource) -> Self {
        Self {
            schema: Arc::new(schema),
            source: Arc::new(source),
            embedder: Arc::new(ScriptedEmbedder::new()),
            store: Arc::new(RecordingStore::new()),
            graph: Arc::new(RecordingGraph::default()),
            indexes: Arc::new(RecordingIndexes::default()),
            cache: Arc::new(CountingCache::default()),
        }
    }

    pub fn with_embedder(mut self, embedder: ScriptedEmbedder) -> Self {
        self.embedder = Arc::new(embedder);
        self
    }

    pub fn with_store(mut self, store: RecordingStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(
            self.schema.clone(),
            self.source.clone(),
            self.embedder.clone(),
            self.store.clone(),
            self.graph.clone(),
            self.indexes.clone(),
        )
        .with_caches(Caches::new().register(self.cache.clone()))
    }
}

/// crm.lead → res.partner → res.country, one FK each.
pub fn lead_partner_country_schema() -> StaticSchema {
    StaticSchema::new()
        .model(
            "crm.lead",
            312,
            vec![
                field(1, "id", "ID", FieldType::Integer),
                field(2, "name", "Name", FieldType::Char),
                fk_field(3, "partner_id", "Customer", "res.partner", 78),
            ],
        )
        .model(
            "res.partner",
            78,
            vec![
                field(10, "id", "ID", FieldType::Integer),
                field(11, "name", "Name", FieldType::Char),
                fk_field(12, "country_id", "Country", "res.country", 20),
            ],
        )
        .model(
            "res.country",
            20,
            vec![
                field(20, "id", "ID", FieldType::Integer),
                field(21, "name", "Name", FieldType::Char),
            ],
        )
}
