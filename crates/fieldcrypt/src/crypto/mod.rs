//! Field encryption primitives: key derivation, envelope codec, and the
//! mode-aware [`FieldCipher`].
//!
//! This module performs no I/O and knows nothing about entities or records.
//!
//! # Ciphertext format
//!
//! ```text
//! <hex(iv, 16 bytes)>:<hex(ciphertext)>:<hex(tag, 16 bytes)>
//! ```
//!
//! AES-256-GCM, key from PBKDF2-HMAC-SHA512 (100 000 rounds, fixed salt).

pub mod cipher;
pub mod envelope;
pub mod key;

pub use cipher::{DecryptOutcome, FieldCipher};
pub use envelope::{looks_like_envelope, CipherError, Envelope};
pub use key::{DerivedKey, KeyOrigin, KeyPolicy, KeyProvider, KEY_LEN};
