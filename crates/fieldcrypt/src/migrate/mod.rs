//! One-shot bulk conversion of every sensitive field between plaintext and
//! envelope form.
//!
//! # Lifecycle
//!
//! 1. [`MigrationJob::run`] loads the checkpoint for its direction, discarding
//!    one left by the opposite direction.
//! 2. Each registered table not yet checkpointed is scanned row by row. The
//!    cancellation token is checked before every row; rows already written
//!    stay written.
//! 3. Only fields not already in the target form are converted, so a re-run
//!    over converted data changes nothing.
//! 4. A table is checkpointed once it finishes with zero failed rows. A run
//!    that completes cleanly clears the checkpoint.
//!
//! # Operational constraints
//!
//! - Nothing else may write the same rows while a job runs (read-modify-write).
//! - Two jobs must not run concurrently against one store.

pub mod checkpoint;
pub mod job;
pub mod store;

pub use checkpoint::{Checkpoint, CheckpointError};
pub use job::MigrationJob;
pub use store::{CheckpointStore, MemoryCheckpoints, MemoryStore, RecordStore};

use std::fmt;

use common::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which way a migration converts stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Plaintext → envelope.
    Encrypt,
    /// Envelope → plaintext.
    Decrypt,
}

impl MigrationDirection {
    /// Lowercase label used in logs and reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            MigrationDirection::Encrypt => "encrypt",
            MigrationDirection::Decrypt => "decrypt",
        }
    }
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a whole migration run.
///
/// Per-row failures never surface here; they are counted in the report.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The encrypt pass was started without an operator secret.
    #[error("encryption is disabled: set PII_ENCRYPTION_KEY before running the encrypt migration")]
    EncryptionDisabled,

    /// The store failed outside a single row: a table could not be loaded,
    /// written, or flushed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The progress checkpoint could not be read or written.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_labels_and_serde() {
        assert_eq!(MigrationDirection::Encrypt.to_string(), "encrypt");
        assert_eq!(MigrationDirection::Decrypt.as_str(), "decrypt");
        let json = serde_json::to_string(&MigrationDirection::Decrypt).unwrap();
        assert_eq!(json, "\"decrypt\"");
    }
}
