//! [`JsonDirStore`]: entity tables as JSON files in one directory.
//!
//! `<root>/<table>.json` holds a JSON array of objects. Every object has an
//! `id` (string or number), unique within the table once normalised to a
//! string. Sensitive fields are strings or null; other values are carried
//! through untouched.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::PathBuf;

use common::{Record, StoreError, StoredRow};
use fieldcrypt::migrate::RecordStore;
use fieldcrypt::{EntityKind, SensitiveField};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::write_atomic;

type JsonRow = Map<String, Value>;

/// File-backed [`RecordStore`]. Writes are buffered per table until `flush`.
#[derive(Debug)]
pub struct JsonDirStore {
    root: PathBuf,
    tables: HashMap<EntityKind, Vec<JsonRow>>,
    dirty: HashSet<EntityKind>,
}

impl JsonDirStore {
    /// Open the data directory at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if `root` is not an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("data directory {} does not exist", root.display()),
            )));
        }
        Ok(Self {
            root,
            tables: HashMap::new(),
            dirty: HashSet::new(),
        })
    }

    fn table_path(&self, kind: EntityKind) -> PathBuf {
        self.root.join(format!("{}.json", kind.table_name()))
    }

    fn read_table(&self, kind: EntityKind) -> Result<Vec<JsonRow>, StoreError> {
        let path = self.table_path(kind);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(table = kind.table_name(), "no table file; treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        serde_json::from_str(&text).map_err(|e| StoreError::Read {
            table: kind.table_name().to_owned(),
            reason: e.to_string(),
        })
    }
}

fn row_id(row: &JsonRow) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn to_stored_row(kind: EntityKind, row: &JsonRow) -> Result<StoredRow, StoreError> {
    let id = row_id(row).ok_or_else(|| StoreError::Read {
        table: kind.table_name().to_owned(),
        reason: "row without a string or numeric id".into(),
    })?;
    let fields: Record = row
        .iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.clone(), Some(s.clone()))),
            Value::Null => Some((k.clone(), None)),
            _ => None,
        })
        .collect();
    for field in unconvertible_fields(kind, row) {
        warn!(
            table = kind.table_name(),
            row = %id,
            field = %field,
            "sensitive field holds a non-string value; left unconverted"
        );
    }
    Ok(StoredRow::new(id, fields))
}

/// Sensitive fields of `row` whose JSON value is neither a string nor null.
fn unconvertible_fields(kind: EntityKind, row: &JsonRow) -> Vec<SensitiveField> {
    kind.sensitive_fields()
        .iter()
        .copied()
        .filter(|f| {
            row.get(f.as_str())
                .is_some_and(|v| !matches!(v, Value::String(_) | Value::Null))
        })
        .collect()
}

impl RecordStore for JsonDirStore {
    fn load_rows(&mut self, kind: EntityKind) -> Result<Vec<StoredRow>, StoreError> {
        let rows = self.read_table(kind)?;
        let stored = rows
            .iter()
            .map(|r| to_stored_row(kind, r))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::with_capacity(stored.len());
        if let Some(dup) = stored.iter().find(|r| !seen.insert(r.id.as_str())) {
            return Err(StoreError::Read {
                table: kind.table_name().to_owned(),
                reason: format!("duplicate row id {}", dup.id),
            });
        }
        debug!(table = kind.table_name(), rows = stored.len(), "table loaded");
        self.tables.insert(kind, rows);
        self.dirty.remove(&kind);
        Ok(stored)
    }

    fn write_row(&mut self, kind: EntityKind, id: &str, changes: &Record) -> Result<(), StoreError> {
        let row = self
            .tables
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|r| row_id(r).as_deref() == Some(id)))
            .ok_or_else(|| StoreError::RowNotFound {
                table: kind.table_name().to_owned(),
                id: id.to_owned(),
            })?;
        for (field, value) in changes {
            let json = value.clone().map_or(Value::Null, Value::String);
            row.insert(field.clone(), json);
        }
        self.dirty.insert(kind);
        Ok(())
    }

    fn flush(&mut self, kind: EntityKind) -> Result<(), StoreError> {
        if !self.dirty.contains(&kind) {
            return Ok(());
        }
        let rows = self.tables.get(&kind).map(Vec::as_slice).unwrap_or_default();
        let bytes = serde_json::to_vec_pretty(rows).map_err(|e| StoreError::Write {
            table: kind.table_name().to_owned(),
            id: "*".into(),
            reason: e.to_string(),
        })?;
        write_atomic(&self.table_path(kind), &bytes)?;
        self.dirty.remove(&kind);
        debug!(table = kind.table_name(), "table flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_table(dir: &TempDir, table: &str, json: &str) {
        fs::write(dir.path().join(format!("{table}.json")), json).unwrap();
    }

    fn read_table(dir: &TempDir, table: &str) -> Vec<JsonRow> {
        let text = fs::read_to_string(dir.path().join(format!("{table}.json"))).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn open_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(JsonDirStore::open(dir.path().join("nope")).is_err());
    }

    #[test]
    fn missing_table_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        assert!(store.load_rows(EntityKind::License).unwrap().is_empty());
        store.flush(EntityKind::License).unwrap();
        assert!(!dir.path().join("licenses.json").exists());
    }

    #[test]
    fn load_keeps_strings_and_nulls() {
        let dir = TempDir::new().unwrap();
        write_table(
            &dir,
            "users",
            r#"[{"id": 1, "email": "a@example.com", "department": null, "active": true}]"#,
        );
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        let rows = store.load_rows(EntityKind::User).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "1");
        assert_eq!(rows[0].fields["email"].as_deref(), Some("a@example.com"));
        assert_eq!(rows[0].fields["department"], None);
        assert!(!rows[0].fields.contains_key("active"));
    }

    #[test]
    fn write_and_flush_preserves_other_values() {
        let dir = TempDir::new().unwrap();
        write_table(
            &dir,
            "assets",
            r#"[{"id": "a1", "serialNumber": "SN1", "assetTag": "T-1", "cost": 1200}]"#,
        );
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        store.load_rows(EntityKind::Asset).unwrap();

        let mut changes = Record::new();
        changes.insert("serialNumber".into(), Some("aa:bb:cc".into()));
        store.write_row(EntityKind::Asset, "a1", &changes).unwrap();

        // Not durable until flushed.
        assert_eq!(read_table(&dir, "assets")[0]["serialNumber"], "SN1");

        store.flush(EntityKind::Asset).unwrap();
        let rows = read_table(&dir, "assets");
        assert_eq!(rows[0]["serialNumber"], "aa:bb:cc");
        assert_eq!(rows[0]["assetTag"], "T-1");
        assert_eq!(rows[0]["cost"], 1200);
    }

    #[test]
    fn write_unknown_row_fails() {
        let dir = TempDir::new().unwrap();
        write_table(&dir, "users", r#"[{"id": "1", "email": "a@example.com"}]"#);
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        store.load_rows(EntityKind::User).unwrap();
        let err = store
            .write_row(EntityKind::User, "2", &Record::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound { .. }));
    }

    #[test]
    fn corrupt_table_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        write_table(&dir, "users", "{ not json");
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load_rows(EntityKind::User),
            Err(StoreError::Read { .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_a_read_error() {
        let dir = TempDir::new().unwrap();
        let original = r#"[{"id": 1, "email": "alice@example.com"}, {"id": "1", "email": "bob@example.com"}]"#;
        write_table(&dir, "users", original);
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        let err = store.load_rows(EntityKind::User).unwrap_err();
        assert!(matches!(err, StoreError::Read { ref reason, .. } if reason.contains("duplicate")));
        assert_eq!(
            fs::read_to_string(dir.path().join("users.json")).unwrap(),
            original
        );
    }

    #[test]
    fn non_string_sensitive_values_are_reported_and_kept() {
        let dir = TempDir::new().unwrap();
        write_table(
            &dir,
            "assets",
            r#"[{"id": "a1", "serialNumber": 12345, "macAddress": null, "notes": "rack 4", "cost": 9}]"#,
        );
        let rows = read_table(&dir, "assets");
        assert_eq!(
            unconvertible_fields(EntityKind::Asset, &rows[0]),
            vec![SensitiveField::SerialNumber]
        );

        let mut store = JsonDirStore::open(dir.path()).unwrap();
        let loaded = store.load_rows(EntityKind::Asset).unwrap();
        assert!(!loaded[0].fields.contains_key("serialNumber"));
        assert_eq!(loaded[0].fields["notes"].as_deref(), Some("rack 4"));
    }

    #[test]
    fn row_without_id_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        write_table(&dir, "users", r#"[{"email": "a@example.com"}]"#);
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        assert!(store.load_rows(EntityKind::User).is_err());
    }
}
