//! Relationship edge model

use serde::{Deserialize, Serialize};

use crate::FieldType;

/// Schema-level edge summarizing one FK field's fan-out between two models.
///
/// There is one edge per (source model, field), not per record pair.
/// Upserting the same edge again replaces its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub source_model: String,
    pub source_model_id: i64,
    pub field_id: i64,
    pub field_name: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub target_model: String,
    pub target_model_id: i64,
    /// Records that contributed to this edge
    pub edge_count: usize,
    /// Distinct target ids observed
    pub unique_targets: usize,
}

impl RelationshipEdge {
    /// Sentence describing the relationship, used as the edge's semantic text.
    pub fn describe(&self) -> String {
        format!(
            "{} relates to {} via {} ({}): {} records referencing {} distinct targets",
            self.source_model,
            self.target_model,
            self.field_label,
            self.field_name,
            self.edge_count,
            self.unique_targets
        )
    }
}
