//! Common error types shared across crates.

use thiserror::Error;

/// Error raised by a record store backing the migration jobs.
///
/// Stores are external collaborators; this type only carries enough detail for
/// the job to log the failure and decide whether to keep going:
/// - [`StoreError::RowNotFound`] and [`StoreError::Write`] are per-row and the
///   job continues with the next row.
/// - [`StoreError::Read`] and [`StoreError::Io`] affect a whole table and abort
///   the job.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The row addressed by a write does not exist in the table.
    #[error("row {id} not found in table {table}")]
    RowNotFound { table: String, id: String },

    /// A table could not be read or decoded.
    #[error("failed to read table {table}: {reason}")]
    Read { table: String, reason: String },

    /// A single row could not be written.
    #[error("failed to write row {id} in table {table}: {reason}")]
    Write {
        table: String,
        id: String,
        reason: String,
    },

    /// Underlying I/O failure while persisting a table.
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if the error is scoped to one row and the job may move on.
    pub fn is_row_scoped(&self) -> bool {
        matches!(self, StoreError::RowNotFound { .. } | StoreError::Write { .. })
    }
}
