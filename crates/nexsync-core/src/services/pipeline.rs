//! Batch embed/upsert pipeline.
//!
//! Batches run strictly in sequence. A failing batch is recorded and the
//! loop moves on; earlier and later batches are unaffected.

use std::sync::Arc;

use nexsync_models::TransformedRecord;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::embeddings::{EmbedMode, Embedder};
use super::identity::{derive_data_identity, PointKind};
use super::stores::{
    sync_timestamp, VectorPoint, VectorStore, KEY_MODEL_ID, KEY_MODEL_NAME, KEY_POINT_ID,
    KEY_POINT_TYPE, KEY_RECORD_ID, KEY_SYNC_TIMESTAMP, KEY_VECTOR_TEXT,
};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::{Error, Result};

/// Counts and per-batch error strings from one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub synced: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

pub struct BatchPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl BatchPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the batch size. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn run(&self, records: &[TransformedRecord]) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::default();

        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            let number = index + 1;
            match self.run_batch(batch).await {
                Ok(()) => {
                    outcome.synced += batch.len();
                    debug!(batch = number, count = batch.len(), "Batch synced");
                }
                Err(e) => {
                    outcome.failed += batch.len();
                    warn!(batch = number, count = batch.len(), error = %e, "Batch failed");
                    outcome.errors.push(format!("Batch {}: {}", number, e));
                }
            }
        }

        outcome
    }

    async fn run_batch(&self, batch: &[TransformedRecord]) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|r| r.vector_text.clone()).collect();
        let vectors = self.embedder.embed(texts, EmbedMode::Document).await?;

        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        let timestamp = sync_timestamp();
        let points = batch
            .iter()
            .zip(vectors)
            .map(|(record, vector)| build_point(record, vector, &timestamp))
            .collect::<Result<Vec<_>>>()?;

        self.store.upsert(points).await
    }
}

/// System keys first, then the record payload for any key not already taken.
fn build_point(record: &TransformedRecord, vector: Vec<f32>, timestamp: &str) -> Result<VectorPoint> {
    let id = derive_data_identity(record.model_id, record.record_id)?.to_string();

    let mut payload = Map::new();
    payload.insert(KEY_POINT_ID.to_string(), Value::String(id.clone()));
    payload.insert(
        KEY_POINT_TYPE.to_string(),
        Value::String(PointKind::Data.as_str().to_string()),
    );
    payload.insert(KEY_RECORD_ID.to_string(), Value::from(record.record_id));
    payload.insert(
        KEY_MODEL_NAME.to_string(),
        Value::String(record.model_name.clone()),
    );
    payload.insert(KEY_MODEL_ID.to_string(), Value::from(record.model_id));
    payload.insert(
        KEY_VECTOR_TEXT.to_string(),
        Value::String(record.vector_text.clone()),
    );
    payload.insert(
        KEY_SYNC_TIMESTAMP.to_string(),
        Value::String(timestamp.to_string()),
    );

    for (key, value) in &record.payload {
        if !payload.contains_key(key) {
            payload.insert(key.clone(), value.clone());
        }
    }

    Ok(VectorPoint {
        id,
        vector,
        payload,
    })
}
