//! Schema registry seam and a JSON-file backed implementation.
//!
//! The registry file is a JSON array with one row per field:
//!
//! ```json
//! [
//!   {"model_name": "crm.lead", "model_id": 312, "field_id": 9001,
//!    "field_name": "partner_id", "field_label": "Customer", "field_type": "many2one",
//!    "fk_location_model": "res.partner", "fk_location_model_id": 78}
//! ]
//! ```
//!
//! Rows keep their file order, which becomes the field order of the
//! semantic text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use nexsync_models::SchemaField;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::cache::CacheInvalidator;
use crate::error::{Error, Result};

/// Source of model and field definitions.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn model_exists(&self, model_name: &str) -> Result<bool>;

    /// Numeric id of a model, `None` if unknown
    async fn model_id(&self, model_name: &str) -> Result<Option<i64>>;

    /// All fields of a model in registry order
    async fn model_fields(&self, model_name: &str) -> Result<Vec<SchemaField>>;

    /// Names of every known model
    async fn model_names(&self) -> Result<Vec<String>>;

    /// The many2one subset of [`model_fields`](Self::model_fields)
    async fn fk_fields(&self, model_name: &str) -> Result<Vec<SchemaField>> {
        Ok(self
            .model_fields(model_name)
            .await?
            .into_iter()
            .filter(|f| f.is_many2one())
            .collect())
    }
}

/// One row of the registry file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRow {
    pub model_name: String,
    pub model_id: i64,
    #[serde(flatten)]
    pub field: SchemaField,
}

#[derive(Debug, Clone)]
struct ModelSchema {
    model_id: i64,
    fields: Vec<SchemaField>,
}

#[derive(Debug, Default)]
struct SchemaIndex {
    models: HashMap<String, ModelSchema>,
    order: Vec<String>,
}

impl SchemaIndex {
    fn from_rows(rows: Vec<SchemaRow>) -> Self {
        let mut index = SchemaIndex::default();
        for row in rows {
            if !index.models.contains_key(&row.model_name) {
                index.order.push(row.model_name.clone());
            }
            let entry = index
                .models
                .entry(row.model_name.clone())
                .or_insert_with(|| ModelSchema {
                    model_id: row.model_id,
                    fields: Vec::new(),
                });
            if entry.model_id != row.model_id {
                warn!(
                    model = %row.model_name,
                    expected = entry.model_id,
                    found = row.model_id,
                    field = %row.field.field_name,
                    "Conflicting model id in schema row, keeping the first"
                );
            }
            entry.fields.push(row.field);
        }
        index
    }
}

/// Registry read from a JSON file, parsed on first use and cached until
/// invalidated.
pub struct JsonSchemaRegistry {
    path: PathBuf,
    cache: RwLock<Option<Arc<SchemaIndex>>>,
}

impl JsonSchemaRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn index(&self) -> Result<Arc<SchemaIndex>> {
        if let Some(index) = self.cache.read().await.as_ref() {
            return Ok(index.clone());
        }

        let mut guard = self.cache.write().await;
        if let Some(index) = guard.as_ref() {
            return Ok(index.clone());
        }

        let bytes = fs::read(&self.path).await.map_err(|e| {
            Error::Schema(format!(
                "Failed to read schema file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let rows: Vec<SchemaRow> = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Schema(format!(
                "Failed to parse schema file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let index = Arc::new(SchemaIndex::from_rows(rows));
        info!(
            path = %self.path.display(),
            models = index.order.len(),
            "Schema registry loaded"
        );
        *guard = Some(index.clone());
        Ok(index)
    }
}

#[async_trait]
impl SchemaRegistry for JsonSchemaRegistry {
    async fn model_exists(&self, model_name: &str) -> Result<bool> {
        Ok(self.index().await?.models.contains_key(model_name))
    }

    async fn model_id(&self, model_name: &str) -> Result<Option<i64>> {
        Ok(self
            .index()
            .await?
            .models
            .get(model_name)
            .map(|m| m.model_id))
    }

    async fn model_fields(&self, model_name: &str) -> Result<Vec<SchemaField>> {
        Ok(self
            .index()
            .await?
            .models
            .get(model_name)
            .map(|m| m.fields.clone())
            .unwrap_or_default())
    }

    async fn model_names(&self) -> Result<Vec<String>> {
        Ok(self.index().await?.order.clone())
    }
}

#[async_trait]
impl CacheInvalidator for JsonSchemaRegistry {
    fn name(&self) -> &str {
        "schema_registry"
    }

    async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_schema(value: serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", value).unwrap();
        file
    }

    fn sample_rows() -> serde_json::Value {
        json!([
            {"model_name": "crm.lead", "model_id": 312, "field_id": 1,
             "field_name": "name", "field_label": "Name", "field_type": "char"},
            {"model_name": "crm.lead", "model_id": 312, "field_id": 2,
             "field_name": "partner_id", "field_label": "Customer", "field_type": "many2one",
             "fk_location_model": "res.partner", "fk_location_model_id": 78},
            {"model_name": "res.partner", "model_id": 78, "field_id": 3,
             "field_name": "name", "field_label": "Name", "field_type": "char"}
        ])
    }

    #[tokio::test]
    async fn test_loads_models_in_file_order() {
        let file = write_schema(sample_rows());
        let registry = JsonSchemaRegistry::new(file.path());

        assert!(registry.model_exists("crm.lead").await.unwrap());
        assert!(!registry.model_exists("sale.order").await.unwrap());
        assert_eq!(registry.model_id("res.partner").await.unwrap(), Some(78));
        assert_eq!(registry.model_id("sale.order").await.unwrap(), None);
        assert_eq!(
            registry.model_names().await.unwrap(),
            vec!["crm.lead", "res.partner"]
        );

        let fields = registry.model_fields("crm.lead").await.unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.field_name.as_str()).collect();
        assert_eq!(names, vec!["name", "partner_id"]);
    }

    #[tokio::test]
    async fn test_fk_fields_filters_many2one() {
        let file = write_schema(sample_rows());
        let registry = JsonSchemaRegistry::new(file.path());

        let fk = registry.fk_fields("crm.lead").await.unwrap();
        assert_eq!(fk.len(), 1);
        assert_eq!(fk[0].fk_target(), Some(("res.partner", 78)));
    }

    #[tokio::test]
    async fn test_invalidate_rereads_file() {
        let file = write_schema(sample_rows());
        let registry = JsonSchemaRegistry::new(file.path());
        assert!(!registry.model_exists("sale.order").await.unwrap());

        std::fs::write(
            file.path(),
            json!([{"model_name": "sale.order", "model_id": 400, "field_id": 9,
                    "field_name": "name", "field_label": "Order", "field_type": "char"}])
            .to_string(),
        )
        .unwrap();

        // Cached until invalidated
        assert!(!registry.model_exists("sale.order").await.unwrap());

        registry.invalidate().await;
        assert!(registry.model_exists("sale.order").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_is_schema_error() {
        let registry = JsonSchemaRegistry::new("/nonexistent/schema.json");
        let err = registry.model_exists("crm.lead").await.unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
