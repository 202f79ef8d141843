//! Field-level PII encryption for heterogeneous records.
//!
//! Sensitive fields are encrypted before they reach the store and decrypted
//! after they leave it. The subsystem performs no I/O: callers hand it records
//! (maps of field name to optional string) and get records back.
//!
//! - [`crypto`]: key derivation, the `ivHex:cipherHex:tagHex` envelope, and the
//!   mode-aware [`FieldCipher`].
//! - [`policy`]: which fields of which entity kind are sensitive.
//! - [`transform`]: per-record and batched application of the cipher.
//! - [`migrate`]: resumable jobs converting a whole dataset between plaintext
//!   and envelope form.
//!
//! # Invariants
//!
//! - Encryption is enabled iff an operator secret is configured, re-checked on
//!   every call.
//! - Decrypt never fails: undecryptable values come back unchanged.
//! - Encrypt failures propagate; plaintext is never stored in place of a
//!   failed encryption.
//! - No plaintext field value or key material is ever logged.

pub mod config;
pub mod crypto;
pub mod migrate;
pub mod policy;
pub mod transform;

pub use config::CryptoConfig;
pub use crypto::{CipherError, DecryptOutcome, FieldCipher, KeyPolicy, KeyProvider};
pub use migrate::{MigrationDirection, MigrationError, MigrationJob};
pub use policy::{field_policy, EntityKind, SensitiveField};
pub use transform::RecordTransformer;
