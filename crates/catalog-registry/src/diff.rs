//! Change detection: compare an incoming data product against what the
//! graph currently holds, one storage category at a time.
//!
//! Everything here is pure. The registry reads the stored state, asks
//! these functions whether anything differs, and only then writes.

use std::collections::BTreeSet;

use catalog_core::{AttrValue, Attributes, DataProduct, ScalarField};

/// One scalar property whose incoming value differs from the stored one.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarChange {
    pub field: ScalarField,
    pub old: Option<AttrValue>,
    pub new: String,
}

/// Scalars present on `incoming` that differ from the root node's properties.
/// Absent incoming scalars are never reported.
pub fn scalar_changes(stored: &Attributes, incoming: &DataProduct) -> Vec<ScalarChange> {
    ScalarField::ALL
        .iter()
        .filter_map(|field| {
            let new = incoming.scalar(*field)?;
            let old = stored.get(field.key());
            if old.and_then(AttrValue::as_str) == Some(new) {
                return None;
            }
            Some(ScalarChange {
                field: *field,
                old: old.cloned(),
                new: new.to_string(),
            })
        })
        .collect()
}

/// Compare string-list relations as sets: order and repeats are irrelevant.
pub fn string_set_changed(stored: &[String], incoming: &[String]) -> bool {
    let stored: BTreeSet<&str> = stored.iter().map(String::as_str).collect();
    let incoming: BTreeSet<&str> = incoming.iter().map(String::as_str).collect();
    stored != incoming
}

/// Structural comparison of a single-dict relation.
///
/// No stored node compares equal to an empty incoming dict.
pub fn dict_changed(stored: Option<&Attributes>, incoming: &Attributes) -> bool {
    match stored {
        Some(stored) => stored != incoming,
        None => !incoming.is_empty(),
    }
}

/// The property an attribute node is merged on: `name` when present,
/// otherwise the first key in order. `None` for an empty dict.
pub fn merge_key(dict: &Attributes) -> Option<&str> {
    if dict.contains_key("name") {
        Some("name")
    } else {
        dict.keys().next().map(String::as_str)
    }
}

/// Values in first-seen order with repeats dropped.
pub fn unique_values(values: &[String]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    values
        .iter()
        .map(String::as_str)
        .filter(|v| seen.insert(*v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::attributes;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scalar_changes_ignore_absent_fields() {
        let stored = attributes([("name", "RawX"), ("schedule", "daily")]);
        let incoming = DataProduct {
            schedule: Some("hourly".to_string()),
            ..Default::default()
        };

        let changes = scalar_changes(&stored, &incoming);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, ScalarField::Schedule);
        assert_eq!(changes[0].old, Some(AttrValue::from("daily")));
        assert_eq!(changes[0].new, "hourly");
    }

    #[test]
    fn test_scalar_changes_report_newly_set_fields() {
        let stored = attributes([("name", "RawX")]);
        let incoming = DataProduct {
            name: Some("RawX".to_string()),
            domain: Some("Sales".to_string()),
            ..Default::default()
        };

        let changes = scalar_changes(&stored, &incoming);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, ScalarField::Domain);
        assert_eq!(changes[0].old, None);
    }

    #[test]
    fn test_product_type_uses_type_property() {
        let stored = attributes([("type", "Table")]);
        let incoming = DataProduct {
            product_type: Some("Table".to_string()),
            ..Default::default()
        };
        assert!(scalar_changes(&stored, &incoming).is_empty());
    }

    #[test]
    fn test_string_sets_ignore_order_and_repeats() {
        assert!(!string_set_changed(
            &strings(&["raw", "customer"]),
            &strings(&["customer", "raw", "raw"])
        ));
        assert!(string_set_changed(
            &strings(&["raw"]),
            &strings(&["raw", "daily"])
        ));
        assert!(string_set_changed(&strings(&["raw"]), &[]));
        assert!(!string_set_changed(&[], &[]));
    }

    #[test]
    fn test_dict_comparison_is_structural() {
        let owner = attributes([("name", "Alice"), ("email", "alice@example.com")]);
        let same = attributes([("email", "alice@example.com"), ("name", "Alice")]);
        let other = attributes([("name", "Bob")]);

        assert!(!dict_changed(Some(&owner), &same));
        assert!(dict_changed(Some(&owner), &other));
        assert!(dict_changed(None, &other));
        assert!(dict_changed(Some(&owner), &Attributes::new()));
        assert!(!dict_changed(None, &Attributes::new()));
    }

    #[test]
    fn test_dict_comparison_distinguishes_value_kinds() {
        let stored = attributes([("sla_hours", 24i64)]);
        let incoming = attributes([("sla_hours", "24")]);
        assert!(dict_changed(Some(&stored), &incoming));
    }

    #[test]
    fn test_merge_key_prefers_name() {
        let with_name = attributes([("email", "a@b.c"), ("name", "Alice")]);
        assert_eq!(merge_key(&with_name), Some("name"));

        let without_name = attributes([("score", "0.9"), ("completeness", "0.98")]);
        assert_eq!(merge_key(&without_name), Some("completeness"));

        assert_eq!(merge_key(&Attributes::new()), None);
    }

    #[test]
    fn test_unique_values_keep_first_order() {
        let values = strings(&["b", "a", "b", "c", "a"]);
        assert_eq!(unique_values(&values), vec!["b", "a", "c"]);
    }
}
