//! Deterministic point identities.
//!
//! Every point in the shared collection gets a UUID-shaped id computed only
//! from numeric registry ids, so syncing the same record twice overwrites the
//! same point.
//!
//! Layout: `KKKKKKKK-MMMM-0000-0000-RRRRRRRRRRRR`
//! - `K`: point kind (`00000001` graph, `00000002` data, `00000003` schema)
//! - `M`: model id, 4 decimal digits
//! - `R`: record or field id, 12 decimal digits
//!
//! Decimal digits are valid hex, so every identity is a valid UUID and still
//! readable by eye.

use std::fmt;

use uuid::Uuid;

use crate::error::{Error, Result};

const MAX_MODEL_ID: i64 = 9_999;
const MAX_RECORD_ID: i64 = 999_999_999_999;

/// Kind of point an identity addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    Graph,
    Data,
    Schema,
}

impl PointKind {
    fn prefix(&self) -> &'static str {
        match self {
            PointKind::Graph => "00000001",
            PointKind::Data => "00000002",
            PointKind::Schema => "00000003",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PointKind::Graph => "graph",
            PointKind::Data => "data",
            PointKind::Schema => "schema",
        }
    }
}

/// A point id in the shared collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Uuid);

impl Identity {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.to_string()
    }
}

/// Identity of a data point: one synced record.
pub fn derive_data_identity(model_id: i64, record_id: i64) -> Result<Identity> {
    derive(PointKind::Data, model_id, record_id)
}

/// Identity of a schema point: one field definition of a model.
pub fn derive_schema_identity(field_id: i64, model_id: i64) -> Result<Identity> {
    derive(PointKind::Schema, model_id, field_id)
}

/// Identity of a relationship edge: one FK field of a source model.
pub fn derive_graph_identity(source_model_id: i64, field_id: i64) -> Result<Identity> {
    derive(PointKind::Graph, source_model_id, field_id)
}

fn derive(kind: PointKind, model_id: i64, local_id: i64) -> Result<Identity> {
    if !(0..=MAX_MODEL_ID).contains(&model_id) {
        return Err(Error::Validation(format!(
            "model id {} out of range for {} identity (0..={})",
            model_id,
            kind.as_str(),
            MAX_MODEL_ID
        )));
    }
    if !(0..=MAX_RECORD_ID).contains(&local_id) {
        return Err(Error::Validation(format!(
            "id {} out of range for {} identity (0..={})",
            local_id,
            kind.as_str(),
            MAX_RECORD_ID
        )));
    }

    let text = format!("{}-{:04}-0000-0000-{:012}", kind.prefix(), model_id, local_id);
    Uuid::parse_str(&text)
        .map(Identity)
        .map_err(|e| Error::Internal(format!("invalid identity {}: {}", text, e)))
}
