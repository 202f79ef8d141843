//! AES-256-GCM envelope for a single string field.
//!
//! An envelope is a 16-byte IV, the ciphertext, and the 16-byte GCM tag,
//! written as `ivHex:cipherHex:tagHex`. The format carries no version marker;
//! [`looks_like_envelope`] is a shape heuristic, not proof of origin.
//!
//! **Every envelope gets a fresh random IV.** GCM nonce reuse under one key
//! breaks both confidentiality and authentication.

use aes_gcm::{
    aead::{
        consts::U16, generic_array::GenericArray, rand_core::RngCore, AeadInPlace, KeyInit, OsRng,
    },
    aes::Aes256,
    AesGcm,
};
use thiserror::Error;

use super::key::DerivedKey;

/// AES-256-GCM with a 128-bit nonce and 128-bit tag.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Byte length of the initialisation vector.
pub const IV_LEN: usize = 16;

/// Byte length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Separator between the three hex segments.
pub const SEPARATOR: char = ':';

/// Errors produced by the envelope layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// AES-GCM encryption failed, or decryption failed authentication
    /// (wrong key or tampered data).
    #[error("aead operation failed")]
    Aead,

    /// The value is not three non-empty `:`-separated hex segments.
    #[error("invalid envelope format")]
    InvalidFormat,

    /// A hex segment decoded to the wrong number of bytes.
    #[error("invalid {segment} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        segment: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Decryption succeeded but the plaintext is not UTF-8.
    #[error("decrypted value is not valid utf-8")]
    NotUtf8,
}

/// A parsed, encrypted field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Random per-envelope IV.
    pub iv: [u8; IV_LEN],
    /// Ciphertext without the tag.
    pub ciphertext: Vec<u8>,
    /// GCM authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl Envelope {
    /// Encrypt `plaintext` under `key` with a fresh random IV.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Aead`] if the AEAD primitive fails.
    pub fn seal(plaintext: &[u8], key: &DerivedKey) -> Result<Self, CipherError> {
        let cipher = build_cipher(key);

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut ciphertext = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut ciphertext)
            .map_err(|_| CipherError::Aead)?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(&tag);

        Ok(Self {
            iv,
            ciphertext,
            tag: tag_bytes,
        })
    }

    /// Decrypt and authenticate this envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Aead`] if authentication fails.
    pub fn open(&self, key: &DerivedKey) -> Result<Vec<u8>, CipherError> {
        let cipher = build_cipher(key);
        let mut buf = self.ciphertext.clone();
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(&self.iv),
                b"",
                &mut buf,
                GenericArray::from_slice(&self.tag),
            )
            .map_err(|_| CipherError::Aead)?;
        Ok(buf)
    }

    /// Decrypt this envelope into a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Aead`] on authentication failure and
    /// [`CipherError::NotUtf8`] if the plaintext is not valid UTF-8.
    pub fn open_string(&self, key: &DerivedKey) -> Result<String, CipherError> {
        String::from_utf8(self.open(key)?).map_err(|_| CipherError::NotUtf8)
    }

    /// Encode this value to its canonical `ivHex:cipherHex:tagHex` form.
    pub fn to_string_repr(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            hex::encode(self.iv),
            hex::encode(&self.ciphertext),
            hex::encode(self.tag),
        )
    }

    /// Parse an `ivHex:cipherHex:tagHex` string. Hex is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidFormat`] if the value does not have the
    /// envelope shape, and [`CipherError::InvalidLength`] if the IV or tag do
    /// not decode to 16 bytes.
    pub fn parse(s: &str) -> Result<Self, CipherError> {
        let (iv_hex, ct_hex, tag_hex) = split_segments(s).ok_or(CipherError::InvalidFormat)?;

        let iv = decode_fixed::<IV_LEN>(iv_hex, "iv")?;
        let ciphertext = hex::decode(ct_hex).map_err(|_| CipherError::InvalidFormat)?;
        let tag = decode_fixed::<TAG_LEN>(tag_hex, "tag")?;

        Ok(Self { iv, ciphertext, tag })
    }
}

/// Returns `true` if `value` has the envelope shape: exactly three non-empty
/// `:`-separated segments, each valid hex.
///
/// Plaintext that happens to have that shape is misclassified; the format has
/// no explicit marker to tell them apart.
pub fn looks_like_envelope(value: &str) -> bool {
    split_segments(value).is_some()
}

/// Hex-character lengths of the `:`-separated segments, for diagnostics.
pub(crate) fn segment_lengths(value: &str) -> Vec<usize> {
    value.split(SEPARATOR).map(str::len).collect()
}

fn split_segments(value: &str) -> Option<(&str, &str, &str)> {
    let mut parts = value.split(SEPARATOR);
    let iv = parts.next()?;
    let ct = parts.next()?;
    let tag = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    [iv, ct, tag]
        .iter()
        .all(|s| is_hex(s))
        .then_some((iv, ct, tag))
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn decode_fixed<const N: usize>(s: &str, segment: &'static str) -> Result<[u8; N], CipherError> {
    let bytes = hex::decode(s).map_err(|_| CipherError::InvalidFormat)?;
    if bytes.len() != N {
        return Err(CipherError::InvalidLength {
            segment,
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn build_cipher(key: &DerivedKey) -> Aes256Gcm16 {
    Aes256Gcm16::new(GenericArray::from_slice(key.as_bytes()))
}
