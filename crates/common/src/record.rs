//! In-memory record shapes exchanged with the storage layer.
//!
//! The core never sees the table structure. A record is a flat map from field
//! name to an optional string value; `None` and `""` both mean "no value".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single record: field name → optional string value.
pub type Record = BTreeMap<String, Option<String>>;

/// Returns the non-empty string value stored under `field`, if any.
pub fn field_value<'r>(record: &'r Record, field: &str) -> Option<&'r str> {
    record
        .get(field)
        .and_then(|v| v.as_deref())
        .filter(|v| !v.is_empty())
}

/// A record together with the primary key the store uses to address it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    /// Store-specific row identifier.
    pub id: String,
    /// Row contents, including non-sensitive fields.
    pub fields: Record,
}

impl StoredRow {
    /// Construct a [`StoredRow`] from an id and its fields.
    pub fn new(id: impl Into<String>, fields: Record) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}
