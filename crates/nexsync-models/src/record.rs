//! Record models
//!
//! Raw records arrive as untyped field-name → value maps. The engine turns
//! each one into a [`TransformedRecord`] carrying the semantic text to embed
//! and the payload to store alongside the vector.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A source row: field name → untyped value. Must carry an `id`.
pub type RawRecord = Map<String, Value>;

/// A record ready for embedding and upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedRecord {
    pub record_id: i64,
    pub model_name: String,
    pub model_id: i64,
    /// Human-readable sentence that gets embedded
    pub vector_text: String,
    /// Non-null source fields plus derived FK keys
    pub payload: Map<String, Value>,
}

/// How a foreign-key value was encoded in the source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkSource {
    /// Bare id: `5` or `"5"`
    Scalar,
    /// Ordered pair: `[5, "Acme"]`
    Tuple,
    /// Nested object: `{"id": 5, "name": "Acme"}`
    Expanded,
}

impl FkSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FkSource::Scalar => "scalar",
            FkSource::Tuple => "tuple",
            FkSource::Expanded => "expanded",
        }
    }
}

/// A resolved foreign-key value.
///
/// Extraction returns `Option<FkValue>`; `None` means the field was unset or
/// unresolvable for that record, which is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FkValue {
    Scalar {
        id: i64,
    },
    Tuple {
        id: i64,
        display_name: Option<String>,
    },
    Expanded {
        id: i64,
        display_name: Option<String>,
    },
}

impl FkValue {
    /// Target record id
    pub fn id(&self) -> i64 {
        match self {
            FkValue::Scalar { id }
            | FkValue::Tuple { id, .. }
            | FkValue::Expanded { id, .. } => *id,
        }
    }

    /// Display label of the target record, if the encoding carried one
    pub fn display_name(&self) -> Option<&str> {
        match self {
            FkValue::Scalar { .. } => None,
            FkValue::Tuple { display_name, .. } | FkValue::Expanded { display_name, .. } => {
                display_name.as_deref()
            }
        }
    }

    pub fn source(&self) -> FkSource {
        match self {
            FkValue::Scalar { .. } => FkSource::Scalar,
            FkValue::Tuple { .. } => FkSource::Tuple,
            FkValue::Expanded { .. } => FkSource::Expanded,
        }
    }
}
