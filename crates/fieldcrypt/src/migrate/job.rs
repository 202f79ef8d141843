//! [`MigrationJob`]: scans every registered table and converts sensitive fields.

use common::record::field_value;
use common::{MigrationReport, Record, StoredRow, TableReport};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::checkpoint::Checkpoint;
use super::store::{CheckpointStore, RecordStore};
use super::{MigrationDirection, MigrationError};
use crate::crypto::{looks_like_envelope, DecryptOutcome, FieldCipher};
use crate::policy::{EntityKind, SensitiveField};

/// Changes computed for a single row.
#[derive(Debug, Default)]
struct RowConversion {
    changes: Record,
    skipped: u64,
    failed: bool,
}

/// A resumable, idempotent bulk conversion in one direction.
#[derive(Debug)]
pub struct MigrationJob<'c> {
    cipher: &'c FieldCipher,
    direction: MigrationDirection,
    cancel: CancellationToken,
}

impl<'c> MigrationJob<'c> {
    /// Create a job that converts with `cipher`.
    pub fn new(cipher: &'c FieldCipher, direction: MigrationDirection) -> Self {
        Self {
            cipher,
            direction,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between rows once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the job over every registered table.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::EncryptionDisabled`] for an encrypt pass
    /// without an operator secret, and store/checkpoint errors that prevent a
    /// table from being read or its progress from being recorded. Row-level
    /// failures are counted in the report instead.
    pub fn run(
        &self,
        store: &mut dyn RecordStore,
        checkpoints: &mut dyn CheckpointStore,
    ) -> Result<MigrationReport, MigrationError> {
        match self.direction {
            MigrationDirection::Encrypt if !self.cipher.is_enabled() => {
                error!("refusing to run encrypt migration without an operator secret");
                return Err(MigrationError::EncryptionDisabled);
            }
            MigrationDirection::Decrypt if !self.cipher.is_enabled() => {
                warn!("no operator secret configured; only envelopes written under the development key can be decrypted");
            }
            _ => {}
        }

        let mut checkpoint = self.resume_point(checkpoints)?;
        let mut report = MigrationReport::new(self.direction.as_str());
        info!(direction = %self.direction, "migration starting");

        for kind in EntityKind::ALL {
            if checkpoint.is_complete(kind) {
                info!(table = kind.table_name(), "table already converted; skipping");
                report.tables.push(TableReport {
                    resumed: true,
                    ..TableReport::new(kind.table_name())
                });
                continue;
            }
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let (table, cancelled) = self.migrate_table(kind, store)?;
            let clean = table.failures == 0 && !cancelled;
            report.tables.push(table);

            if cancelled {
                report.cancelled = true;
                break;
            }
            if clean {
                checkpoint.mark_complete(kind);
                checkpoints.save(&checkpoint)?;
            }
        }

        if !report.cancelled && report.failures() == 0 {
            checkpoints.clear()?;
        }

        let totals = report.totals();
        info!(
            direction = %self.direction,
            rows_scanned = totals.rows_scanned,
            rows_updated = totals.rows_updated,
            fields_converted = totals.fields_converted,
            fields_skipped = totals.fields_skipped,
            failures = totals.failures,
            cancelled = report.cancelled,
            "migration finished"
        );
        Ok(report)
    }

    /// Load the checkpoint for this direction, discarding a stale one.
    fn resume_point(&self, checkpoints: &mut dyn CheckpointStore) -> Result<Checkpoint, MigrationError> {
        Ok(match checkpoints.load()? {
            Some(cp) if cp.direction == self.direction => {
                info!(
                    completed = cp.completed_tables.len(),
                    "resuming migration from checkpoint"
                );
                cp
            }
            Some(cp) => {
                warn!(
                    checkpoint_direction = %cp.direction,
                    "discarding checkpoint left by a migration in the other direction"
                );
                Checkpoint::new(self.direction)
            }
            None => Checkpoint::new(self.direction),
        })
    }

    /// Convert one table. Returns its counters and whether it was cut short.
    fn migrate_table(
        &self,
        kind: EntityKind,
        store: &mut dyn RecordStore,
    ) -> Result<(TableReport, bool), MigrationError> {
        let table = kind.table_name();
        let fields = kind.sensitive_fields();
        let rows = store.load_rows(kind)?;
        let mut report = TableReport::new(table);
        let mut cancelled = false;

        for row in &rows {
            if self.cancel.is_cancelled() {
                warn!(table, processed = report.rows_scanned, "migration cancelled between rows");
                cancelled = true;
                break;
            }
            report.rows_scanned += 1;

            let conversion = self.convert_row(kind, row, fields);
            report.fields_skipped += conversion.skipped;
            let mut failed = conversion.failed;

            if !conversion.changes.is_empty() {
                match store.write_row(kind, &row.id, &conversion.changes) {
                    Ok(()) => {
                        report.rows_updated += 1;
                        report.fields_converted += conversion.changes.len() as u64;
                    }
                    Err(e) if !e.is_row_scoped() => return Err(e.into()),
                    Err(e) => {
                        error!(table, row = %row.id, error = %e, "failed to persist converted row");
                        failed = true;
                    }
                }
            }

            if failed {
                report.failures += 1;
            }
        }

        store.flush(kind)?;
        info!(
            table,
            rows_scanned = report.rows_scanned,
            rows_updated = report.rows_updated,
            fields_converted = report.fields_converted,
            fields_skipped = report.fields_skipped,
            failures = report.failures,
            "table converted"
        );
        Ok((report, cancelled))
    }

    fn convert_row(&self, kind: EntityKind, row: &StoredRow, fields: &[SensitiveField]) -> RowConversion {
        let mut out = RowConversion::default();

        for &field in fields {
            let Some(value) = field_value(&row.fields, field.as_str()) else {
                out.skipped += 1;
                continue;
            };

            let converted = match self.direction {
                MigrationDirection::Encrypt => self.encrypt_value(kind, row, field, value),
                MigrationDirection::Decrypt => self.decrypt_value(kind, row, field, value),
            };

            match converted {
                Ok(Some(new_value)) => {
                    out.changes.insert(field.as_str().to_owned(), Some(new_value));
                }
                Ok(None) => out.skipped += 1,
                Err(()) => out.failed = true,
            }
        }
        out
    }

    /// `Ok(None)` when the value is already an envelope.
    fn encrypt_value(
        &self,
        kind: EntityKind,
        row: &StoredRow,
        field: SensitiveField,
        value: &str,
    ) -> Result<Option<String>, ()> {
        if looks_like_envelope(value) {
            return Ok(None);
        }
        self.cipher.encrypt(Some(value)).map_err(|e| {
            error!(
                table = kind.table_name(),
                row = %row.id,
                field = %field,
                error = %e,
                "field encryption failed"
            );
        })
    }

    /// `Ok(None)` when the value is not an envelope.
    fn decrypt_value(
        &self,
        kind: EntityKind,
        row: &StoredRow,
        field: SensitiveField,
        value: &str,
    ) -> Result<Option<String>, ()> {
        if !looks_like_envelope(value) {
            return Ok(None);
        }
        match self.cipher.decrypt_outcome(value) {
            DecryptOutcome::Decrypted(plaintext) => Ok(Some(plaintext)),
            DecryptOutcome::Degraded { failure, .. } => {
                error!(
                    table = kind.table_name(),
                    row = %row.id,
                    field = %field,
                    error = %failure,
                    "field decryption failed; value left unchanged"
                );
                Err(())
            }
            DecryptOutcome::Legacy(_) | DecryptOutcome::Malformed(_) => Ok(None),
        }
    }
}
