//! Chunked decryption of multi-row read results.
//!
//! Chunks bound the working set of one call; they run sequentially and the
//! output order always matches the input order.

use common::record::Record;
use tracing::debug;

use super::RecordTransformer;
use crate::policy::{EntityKind, SensitiveField};

impl RecordTransformer<'_> {
    /// Decrypt the listed fields of every record, chunk by chunk.
    ///
    /// Equivalent to calling [`decrypt_fields`](Self::decrypt_fields) on each
    /// record in order.
    pub fn batch_decrypt_fields(&self, records: &[Record], fields: &[SensitiveField]) -> Vec<Record> {
        let mut out = Vec::with_capacity(records.len());
        for (index, chunk) in records.chunks(self.chunk_size).enumerate() {
            debug!(chunk = index, size = chunk.len(), "decrypting record chunk");
            out.extend(chunk.iter().map(|r| self.decrypt_fields(r, fields)));
        }
        out
    }

    /// [`batch_decrypt_fields`](Self::batch_decrypt_fields) with the registry's
    /// field list for `kind`.
    pub fn batch_decrypt_entity(&self, kind: EntityKind, records: &[Record]) -> Vec<Record> {
        self.batch_decrypt_fields(records, kind.sensitive_fields())
    }
}
