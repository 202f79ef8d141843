//! Storage seams for the migration jobs, plus in-memory implementations.
//!
//! The real tables live behind an external storage layer. A job only needs to
//! read every row of a table, write back changed fields of one row, and make
//! those writes durable.

use std::collections::HashMap;

use common::{Record, StoredRow, StoreError};

use super::checkpoint::{Checkpoint, CheckpointError};
use crate::policy::EntityKind;

/// Row-level access to the entity tables.
#[cfg_attr(test, mockall::automock)]
pub trait RecordStore {
    /// Every row of `kind`'s table. An absent table yields no rows.
    fn load_rows(&mut self, kind: EntityKind) -> Result<Vec<StoredRow>, StoreError>;

    /// Overwrite the fields in `changes` on row `id`, leaving other fields alone.
    fn write_row(&mut self, kind: EntityKind, id: &str, changes: &Record) -> Result<(), StoreError>;

    /// Make every write to `kind`'s table since the last flush durable.
    fn flush(&mut self, kind: EntityKind) -> Result<(), StoreError>;
}

/// Persistence for a migration [`Checkpoint`].
pub trait CheckpointStore {
    /// The stored checkpoint, if any.
    fn load(&mut self) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Replace the stored checkpoint.
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Remove the stored checkpoint.
    fn clear(&mut self) -> Result<(), CheckpointError>;
}

/// In-memory [`RecordStore`]. Writes are immediately durable.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: HashMap<EntityKind, Vec<StoredRow>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row to `kind`'s table.
    pub fn insert(&mut self, kind: EntityKind, row: StoredRow) {
        self.tables.entry(kind).or_default().push(row);
    }

    /// Rows of `kind`'s table in insertion order.
    pub fn rows(&self, kind: EntityKind) -> &[StoredRow] {
        self.tables.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// The row `id` in `kind`'s table.
    pub fn row(&self, kind: EntityKind, id: &str) -> Option<&StoredRow> {
        self.rows(kind).iter().find(|r| r.id == id)
    }
}

impl RecordStore for MemoryStore {
    fn load_rows(&mut self, kind: EntityKind) -> Result<Vec<StoredRow>, StoreError> {
        Ok(self.rows(kind).to_vec())
    }

    fn write_row(&mut self, kind: EntityKind, id: &str, changes: &Record) -> Result<(), StoreError> {
        let row = self
            .tables
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| StoreError::RowNotFound {
                table: kind.table_name().to_owned(),
                id: id.to_owned(),
            })?;
        row.fields
            .extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn flush(&mut self, _kind: EntityKind) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory [`CheckpointStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoints {
    current: Option<Checkpoint>,
}

impl MemoryCheckpoints {
    /// Create a store holding no checkpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with `checkpoint`.
    pub fn with(checkpoint: Checkpoint) -> Self {
        Self {
            current: Some(checkpoint),
        }
    }

    /// The checkpoint currently held.
    pub fn current(&self) -> Option<&Checkpoint> {
        self.current.as_ref()
    }
}

impl CheckpointStore for MemoryCheckpoints {
    fn load(&mut self) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.current.clone())
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.current = Some(checkpoint.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CheckpointError> {
        self.current = None;
        Ok(())
    }
}
