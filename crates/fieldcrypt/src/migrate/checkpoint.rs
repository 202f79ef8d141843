//! Per-table progress checkpoints for resumable migrations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::MigrationDirection;
use crate::policy::EntityKind;

/// Errors from a [`CheckpointStore`](super::CheckpointStore).
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The checkpoint could not be read or written.
    #[error("checkpoint i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored checkpoint could not be decoded.
    #[error("checkpoint is corrupt: {0}")]
    Corrupt(String),
}

/// Tables a migration has fully converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Direction of the run that wrote this checkpoint.
    pub direction: MigrationDirection,
    /// Table names converted with zero failures.
    pub completed_tables: BTreeSet<String>,
}

impl Checkpoint {
    /// Empty checkpoint for `direction`.
    pub fn new(direction: MigrationDirection) -> Self {
        Self {
            direction,
            completed_tables: BTreeSet::new(),
        }
    }

    /// `true` if `kind`'s table has been fully converted.
    pub fn is_complete(&self, kind: EntityKind) -> bool {
        self.completed_tables.contains(kind.table_name())
    }

    /// Record `kind`'s table as fully converted.
    pub fn mark_complete(&mut self, kind: EntityKind) {
        self.completed_tables.insert(kind.table_name().to_owned());
    }
}
