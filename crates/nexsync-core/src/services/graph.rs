//! Relationship graph maintenance.
//!
//! After a model's records are written, each many2one field with a declared
//! target becomes one edge summarizing how the model references the target.
//! Edge writes are advisory: a failure is logged and the sync carries on.

use std::collections::BTreeSet;
use std::sync::Arc;

use nexsync_models::{RawRecord, RelationshipEdge, SchemaField};
use tracing::{debug, warn};

use super::fk::extract_fk;
use super::stores::GraphStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphUpdate {
    pub edges_created: usize,
}

pub struct GraphEdgeUpdater {
    store: Arc<dyn GraphStore>,
}

impl GraphEdgeUpdater {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn update(
        &self,
        model_name: &str,
        model_id: i64,
        records: &[RawRecord],
        fields: &[SchemaField],
    ) -> GraphUpdate {
        let mut update = GraphUpdate::default();

        for edge in build_edges(model_name, model_id, records, fields) {
            match self.store.upsert_edge(&edge).await {
                Ok(()) => {
                    update.edges_created += 1;
                    debug!(
                        model = %model_name,
                        field = %edge.field_name,
                        target = %edge.target_model,
                        edge_count = edge.edge_count,
                        "Relationship edge upserted"
                    );
                }
                Err(e) => {
                    warn!(
                        model = %model_name,
                        field = %edge.field_name,
                        error = %e,
                        "Failed to upsert relationship edge"
                    );
                }
            }
        }

        update
    }
}

/// One edge per many2one field with a declared target and at least one
/// resolved value.
pub fn build_edges(
    model_name: &str,
    model_id: i64,
    records: &[RawRecord],
    fields: &[SchemaField],
) -> Vec<RelationshipEdge> {
    fields
        .iter()
        .filter(|f| f.is_many2one())
        .filter_map(|field| {
            let (target_model, target_model_id) = field.fk_target()?;

            let unique: BTreeSet<i64> = records
                .iter()
                .filter_map(|r| extract_fk(r, field))
                .map(|fk| fk.id())
                .collect();
            if unique.is_empty() {
                return None;
            }

            Some(RelationshipEdge {
                source_model: model_name.to_string(),
                source_model_id: model_id,
                field_id: field.field_id,
                field_name: field.field_name.clone(),
                field_label: field.display_label().to_string(),
                field_type: field.field_type.clone(),
                target_model: target_model.to_string(),
                target_model_id,
                // Every record of the batch, resolved or not
                edge_count: records.len(),
                unique_targets: unique.len(),
            })
        })
        .collect()
}
