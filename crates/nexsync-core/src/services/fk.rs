//! Foreign-key value extraction.
//!
//! Source rows encode a many2one value in one of three shapes depending on
//! how they were exported:
//!
//! | Shape      | Example                        |
//! |------------|--------------------------------|
//! | scalar     | `5` or `"5"`                   |
//! | tuple      | `[5, "Acme"]`                  |
//! | expanded   | `{"id": 5, "name": "Acme"}`    |
//!
//! The expanded shape is found either under the field name itself or under
//! `<field>_expanded`. Spreadsheet exports sometimes prefix a header with a
//! single space, so every lookup also tries `" <field>"`.

use nexsync_models::{FkValue, RawRecord, SchemaField};
use serde_json::Value;

/// Suffix of the side column carrying a pre-expanded FK object
const EXPANDED_SUFFIX: &str = "_expanded";

/// Properties that can carry a display label, in preference order
const LABEL_KEYS: &[&str] = &["display_name", "name", "label", "title"];

/// Extract the FK target of `field` from `record`.
///
/// Returns `None` when the field is absent, null, or unresolvable. That is
/// the common case for optional relations and is not an error.
pub fn extract_fk(record: &RawRecord, field: &SchemaField) -> Option<FkValue> {
    let name = field.field_name.as_str();
    let value = lookup(record, name);

    if let Some(value) = value {
        if let Some(id) = scalar_id(value) {
            return Some(FkValue::Scalar { id });
        }
        if let Some((id, display_name)) = tuple_value(value) {
            return Some(FkValue::Tuple { id, display_name });
        }
        if let Some((id, display_name)) = expanded_value(value) {
            return Some(FkValue::Expanded { id, display_name });
        }
    }

    lookup(record, &format!("{}{}", name, EXPANDED_SUFFIX))
        .and_then(expanded_value)
        .map(|(id, display_name)| FkValue::Expanded { id, display_name })
}

/// Look a field up by exact name, then with one leading space. A null under
/// the exact name does not hide a padded value.
pub fn lookup<'a>(record: &'a RawRecord, name: &str) -> Option<&'a Value> {
    let exact = record.get(name);
    exact
        .filter(|v| !v.is_null())
        .or_else(|| record.get(&format!(" {}", name)))
        .or(exact)
}

/// Parse a positive integer id from a number or a numeric string.
pub fn parse_positive_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}

fn scalar_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(_) | Value::String(_) => parse_positive_id(value),
        _ => None,
    }
}

fn tuple_value(value: &Value) -> Option<(i64, Option<String>)> {
    match value.as_array()?.as_slice() {
        [id, label] => Some((parse_positive_id(id)?, label_text(label))),
        _ => None,
    }
}

fn expanded_value(value: &Value) -> Option<(i64, Option<String>)> {
    let obj = value.as_object()?;
    let id = parse_positive_id(obj.get("id")?)?;
    let display_name = LABEL_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(label_text));
    Some((id, display_name))
}

fn label_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
