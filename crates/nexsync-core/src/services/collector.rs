//! FK target collection for cascades.

use std::collections::{BTreeMap, BTreeSet};

use nexsync_models::{RawRecord, SchemaField};

use super::fk::extract_fk;

/// Resolved target ids per target model, across every FK field and record.
///
/// Fields that don't declare a target model contribute nothing.
pub fn collect_fk_targets(
    records: &[RawRecord],
    fk_fields: &[SchemaField],
) -> BTreeMap<String, BTreeSet<i64>> {
    let mut targets: BTreeMap<String, BTreeSet<i64>> = BTreeMap::new();

    for field in fk_fields {
        let Some(target_model) = field
            .fk_location_model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
        else {
            continue;
        };

        let ids: BTreeSet<i64> = records
            .iter()
            .filter_map(|r| extract_fk(r, field))
            .map(|fk| fk.id())
            .collect();

        if !ids.is_empty() {
            targets
                .entry(target_model.to_string())
                .or_default()
                .extend(ids);
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexsync_models::FieldType;
    use serde_json::json;

    fn fk_field(name: &str, target: Option<&str>) -> SchemaField {
        SchemaField {
            field_id: 1,
            field_name: name.to_string(),
            field_label: name.to_string(),
            field_type: FieldType::Many2one,
            fk_location_model: target.map(str::to_string),
            fk_location_model_id: None,
        }
    }

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unions_ids_per_target_model() {
        let records = vec![
            record(json!({"id": 1, "partner_id": 5, "invoice_partner_id": [6, "Beta"]})),
            record(json!({"id": 2, "partner_id": [5, "Acme"], "user_id": 2})),
            record(json!({"id": 3, "partner_id": {"id": 7, "name": "Gamma"}})),
            record(json!({"id": 4, "partner_id": false})),
        ];
        let fields = vec![
            fk_field("partner_id", Some("res.partner")),
            fk_field("invoice_partner_id", Some("res.partner")),
            fk_field("user_id", Some("res.users")),
        ];

        let targets = collect_fk_targets(&records, &fields);

        assert_eq!(targets.len(), 2);
        assert_eq!(
            targets["res.partner"].iter().copied().collect::<Vec<_>>(),
            vec![5, 6, 7]
        );
        assert_eq!(
            targets["res.users"].iter().copied().collect::<Vec<_>>(),
            vec![2]
        );
    }

    #[test]
    fn test_fields_without_target_are_ignored() {
        let records = vec![record(json!({"id": 1, "country_id": 21}))];
        let fields = vec![fk_field("country_id", None), fk_field("country_id", Some("  "))];

        assert!(collect_fk_targets(&records, &fields).is_empty());
    }

    #[test]
    fn test_no_resolved_values_gives_empty_map() {
        let records = vec![record(json!({"id": 1}))];
        let fields = vec![fk_field("partner_id", Some("res.partner"))];

        assert!(collect_fk_targets(&records, &fields).is_empty());
    }
}
