//! Applies the field cipher to the sensitive fields of whole records.
//!
//! The storage layer calls [`RecordTransformer::encrypt_fields`] before insert
//! or update, [`RecordTransformer::decrypt_fields`] after a single-row read, and
//! [`RecordTransformer::batch_decrypt_fields`] after multi-row reads. The
//! enabled/disabled check happens inside the cipher; callers never test it.

pub mod batch;
pub mod record;

pub use record::CheckedRecord;

use crate::config::{CryptoConfig, DEFAULT_CHUNK_SIZE};
use crate::crypto::FieldCipher;

/// Record-level view over a borrowed [`FieldCipher`].
#[derive(Debug, Clone, Copy)]
pub struct RecordTransformer<'c> {
    cipher: &'c FieldCipher,
    chunk_size: usize,
}

impl<'c> RecordTransformer<'c> {
    /// Transformer using the default batch chunk size.
    pub fn new(cipher: &'c FieldCipher) -> Self {
        Self {
            cipher,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Transformer using the chunk size from `cfg`.
    pub fn from_config(cipher: &'c FieldCipher, cfg: &CryptoConfig) -> Self {
        Self::new(cipher).with_chunk_size(cfg.pii_batch_chunk_size)
    }

    /// Override the batch chunk size. Zero is clamped to one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// The cipher this transformer applies.
    pub fn cipher(&self) -> &'c FieldCipher {
        self.cipher
    }

    /// Records per batch chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_comes_from_config() {
        let cfg = CryptoConfig {
            pii_batch_chunk_size: 25,
            ..CryptoConfig::with_secret("s3cret")
        };
        let cipher = FieldCipher::from_config(&cfg);
        assert_eq!(RecordTransformer::from_config(&cipher, &cfg).chunk_size(), 25);
        assert_eq!(
            RecordTransformer::from_config(&cipher, &CryptoConfig::disabled()).chunk_size(),
            DEFAULT_CHUNK_SIZE
        );
    }
}
