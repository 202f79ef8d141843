//! Common types, report definitions, and errors shared across the `fieldcrypt` crates.

pub mod error;
pub mod record;
pub mod report;

pub use error::StoreError;
pub use record::{Record, StoredRow};
pub use report::{MigrationReport, TableReport};
