//! Migration reports produced by the one-shot conversion jobs.
//!
//! Reports are printed to operators as a per-table table plus totals and can
//! be serialised as JSON for tooling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exit status for a run that completed without row failures.
pub const EXIT_OK: u8 = 0;
/// Exit status for a run that completed but left failed rows behind.
pub const EXIT_ROW_FAILURES: u8 = 1;
/// Exit status for a run aborted by a fatal error (config, store, checkpoint).
pub const EXIT_FATAL: u8 = 2;
/// Exit status for a run interrupted by the operator.
pub const EXIT_CANCELLED: u8 = 130;

/// Counters for a single entity table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    /// Table name as known to the store.
    pub table: String,
    /// Rows read from the store.
    pub rows_scanned: u64,
    /// Rows with at least one field written back.
    pub rows_updated: u64,
    /// Individual field values converted to the target form.
    pub fields_converted: u64,
    /// Field values already in the target form (or empty) and left alone.
    pub fields_skipped: u64,
    /// Rows that failed to convert or persist.
    pub failures: u64,
    /// `true` if the table was skipped because a checkpoint marked it complete.
    #[serde(default)]
    pub resumed: bool,
}

impl TableReport {
    /// Create an empty report for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }
}

/// Outcome of one migration run across every registered table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// `"encrypt"` or `"decrypt"`.
    pub direction: String,
    /// Per-table counters in processing order.
    pub tables: Vec<TableReport>,
    /// `true` if the run stopped early on a cancellation signal.
    pub cancelled: bool,
}

impl MigrationReport {
    /// Create an empty report for the given direction label.
    pub fn new(direction: impl Into<String>) -> Self {
        Self {
            direction: direction.into(),
            ..Self::default()
        }
    }

    /// Sum of all per-table counters.
    pub fn totals(&self) -> TableReport {
        self.tables
            .iter()
            .fold(TableReport::new("TOTAL"), |mut acc, t| {
                acc.rows_scanned += t.rows_scanned;
                acc.rows_updated += t.rows_updated;
                acc.fields_converted += t.fields_converted;
                acc.fields_skipped += t.fields_skipped;
                acc.failures += t.failures;
                acc
            })
    }

    /// Total failed rows across all tables.
    pub fn failures(&self) -> u64 {
        self.tables.iter().map(|t| t.failures).sum()
    }

    /// Process exit status that reflects this outcome.
    pub fn exit_code(&self) -> u8 {
        if self.cancelled {
            EXIT_CANCELLED
        } else if self.failures() > 0 {
            EXIT_ROW_FAILURES
        } else {
            EXIT_OK
        }
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "table", "scanned", "updated", "converted", "skipped", "failed"
        )?;
        for t in self.tables.iter().chain(std::iter::once(&self.totals())) {
            let label = if t.resumed {
                format!("{} (done)", t.table)
            } else {
                t.table.clone()
            };
            writeln!(
                f,
                "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10}",
                label,
                t.rows_scanned,
                t.rows_updated,
                t.fields_converted,
                t.fields_skipped,
                t.failures
            )?;
        }
        if self.cancelled {
            writeln!(f, "{} migration cancelled before completion", self.direction)?;
        }
        Ok(())
    }
}
