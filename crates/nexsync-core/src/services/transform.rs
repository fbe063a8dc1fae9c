//! Record transformer: raw rows → semantic text + storage payload.

use std::collections::HashMap;

use nexsync_models::{FieldType, FkValue, RawRecord, SchemaField, TransformedRecord};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::fk::{extract_fk, lookup, parse_positive_id};
use super::identity::derive_data_identity;
use crate::error::{Error, Result};

/// Payload key suffix holding the FK target's point identity
pub const FK_IDENTITY_SUFFIX: &str = "_qdrant";

/// Payload key suffix holding a normalized scalar FK id
pub const FK_ID_SUFFIX: &str = "_id";

/// Transform raw records into embeddable records, preserving input order.
///
/// Records without a usable `id` are skipped. An empty schema is an error:
/// without it there is no field order and no labels. Bad field values never
/// fail the batch; at worst a record loses a derived payload key.
pub fn transform_records(
    records: &[RawRecord],
    model_name: &str,
    model_id: i64,
    fields: &[SchemaField],
) -> Result<Vec<TransformedRecord>> {
    if fields.is_empty() {
        return Err(Error::Schema(format!(
            "No schema fields for model {}",
            model_name
        )));
    }

    let types: HashMap<&str, &FieldType> = fields
        .iter()
        .map(|f| (f.field_name.as_str(), &f.field_type))
        .collect();

    let mut out = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let Some(record_id) = lookup(record, "id").and_then(parse_positive_id) else {
            debug!(model = %model_name, index, "Skipping record without id");
            continue;
        };

        out.push(TransformedRecord {
            record_id,
            model_name: model_name.to_string(),
            model_id,
            vector_text: build_vector_text(record, record_id, model_name, fields),
            payload: build_payload(record, record_id, model_name, fields, &types),
        });
    }

    Ok(out)
}

/// `"<model> record <id>: <Label>: <value>; <Label>: <value>"` in schema order.
fn build_vector_text(
    record: &RawRecord,
    record_id: i64,
    model_name: &str,
    fields: &[SchemaField],
) -> String {
    let parts: Vec<String> = fields
        .iter()
        .filter(|f| f.field_name != "id")
        .filter_map(|f| {
            let rendered = if f.is_many2one() {
                render_relational(record, f)
            } else {
                None
            };
            let rendered = rendered.or_else(|| {
                lookup(record, &f.field_name)
                    .filter(|v| !is_empty_value(v, &f.field_type))
                    .map(|v| format_value(v, &f.field_type))
            })?;
            Some(format!("{}: {}", f.display_label(), rendered))
        })
        .collect();

    if parts.is_empty() {
        format!("{} record {}", model_name, record_id)
    } else {
        format!("{} record {}: {}", model_name, record_id, parts.join("; "))
    }
}

fn render_relational(record: &RawRecord, field: &SchemaField) -> Option<String> {
    let fk = extract_fk(record, field)?;
    Some(match fk.display_name() {
        Some(name) => format!("{} (id: {})", name, fk.id()),
        None => format!("id: {}", fk.id()),
    })
}

fn build_payload(
    record: &RawRecord,
    record_id: i64,
    model_name: &str,
    fields: &[SchemaField],
    types: &HashMap<&str, &FieldType>,
) -> Map<String, Value> {
    let mut payload = Map::new();

    for (raw_key, value) in record {
        let key = raw_key.trim();
        // A non-null exact header beats its padded twin, matching `lookup`.
        if key != raw_key.as_str() && record.get(key).is_some_and(|v| !v.is_null()) {
            continue;
        }
        let keep = match types.get(key) {
            Some(field_type) => !is_empty_value(value, field_type),
            None => !value.is_null(),
        };
        if keep {
            payload.insert(key.to_string(), value.clone());
        }
    }

    for field in fields.iter().filter(|f| f.is_many2one()) {
        let Some(fk) = extract_fk(record, field) else {
            continue;
        };
        if let Some(target_model_id) = field.fk_location_model_id {
            match derive_data_identity(target_model_id, fk.id()) {
                Ok(identity) => {
                    payload.insert(
                        format!("{}{}", field.field_name, FK_IDENTITY_SUFFIX),
                        Value::String(identity.to_string()),
                    );
                }
                Err(e) => warn!(
                    model = %model_name,
                    record_id,
                    field = %field.field_name,
                    error = %e,
                    "FK target identity not derivable, key omitted"
                ),
            }
        }
        if let FkValue::Scalar { id } = fk {
            payload.insert(
                format!("{}{}", field.field_name, FK_ID_SUFFIX),
                Value::from(id),
            );
        }
    }

    payload
}

/// Null-like values: JSON null, blank strings, empty arrays, and `false` on
/// non-boolean fields (spreadsheet exports write unset values as `false`).
fn is_empty_value(value: &Value, field_type: &FieldType) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Bool(false) => *field_type != FieldType::Boolean,
        _ => false,
    }
}

fn format_value(value: &Value, field_type: &FieldType) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => {
            if *b {
                "Yes".to_string()
            } else {
                "No".to_string()
            }
        }
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.split_whitespace().collect::<Vec<_>>().join(" "),
        Value::Array(items) => items
            .iter()
            .filter(|v| !is_empty_value(v, field_type))
            .map(|v| format_value(v, field_type))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}
