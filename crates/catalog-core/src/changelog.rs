//! Change-log records written when an update detects a mutation.
//!
//! Entries are append-only: one per changed field or relation, persisted as
//! a `ChangeLog` node hanging off the data product's root node.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AttrValue, Attributes};

/// Old value recorded when a dict-list relation is replaced wholesale.
pub const PREVIOUS_ENTRIES: &str = "previous entries";

/// One detected mutation of a field or relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub timestamp: DateTime<Utc>,
}

impl ChangeLogEntry {
    pub fn new(field: &str, old_value: String, new_value: String) -> Self {
        Self {
            field: field.to_string(),
            old_value,
            new_value,
            timestamp: Utc::now(),
        }
    }

    /// Properties of the `ChangeLog` node.
    pub fn to_attributes(&self) -> Attributes {
        let mut props = Attributes::new();
        props.insert("field".to_string(), AttrValue::from(self.field.as_str()));
        props.insert("old_value".to_string(), AttrValue::from(self.old_value.as_str()));
        props.insert("new_value".to_string(), AttrValue::from(self.new_value.as_str()));
        // Fixed width so lexical order on the stored text is chronological.
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true);
        props.insert("timestamp".to_string(), AttrValue::from(timestamp));
        props
    }

    /// Rebuild an entry from a `ChangeLog` node's properties.
    pub fn from_attributes(props: &Attributes) -> Option<Self> {
        let text = |key: &str| props.get(key).and_then(AttrValue::as_str);
        let timestamp = DateTime::parse_from_rfc3339(text("timestamp")?)
            .ok()?
            .with_timezone(&Utc);

        Some(Self {
            field: text("field")?.to_string(),
            old_value: text("old_value")?.to_string(),
            new_value: text("new_value")?.to_string(),
            timestamp,
        })
    }
}

/// Serialize a value for the change log.
///
/// Values are stored as JSON text so that lists and dicts stay readable.
pub fn serialize_value<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
