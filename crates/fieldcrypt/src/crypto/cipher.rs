//! [`FieldCipher`]: mode-aware encrypt/decrypt of individual field values.
//!
//! Encryption is enabled iff an operator secret is configured, checked on
//! every call. Encrypt is fail-closed: AEAD errors propagate so a write never
//! silently stores plaintext. Decrypt is fail-open: every input yields a
//! usable string, and failures are reported through [`DecryptOutcome`].

use tracing::{debug, warn};

use super::envelope::{looks_like_envelope, segment_lengths, CipherError, Envelope, SEPARATOR};
use super::key::KeyProvider;
use crate::config::CryptoConfig;

/// Result of decrypting one stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// The value was an envelope and decrypted cleanly.
    Decrypted(String),
    /// The value contains no `:` and is treated as legacy plaintext.
    Legacy(String),
    /// The value contains `:` but is not an envelope; treated as plaintext.
    Malformed(String),
    /// The value looked like an envelope but could not be decrypted. The
    /// original string is returned unchanged.
    Degraded {
        original: String,
        failure: CipherError,
    },
}

impl DecryptOutcome {
    /// The string to hand back to the caller.
    pub fn value(&self) -> &str {
        match self {
            DecryptOutcome::Decrypted(v)
            | DecryptOutcome::Legacy(v)
            | DecryptOutcome::Malformed(v)
            | DecryptOutcome::Degraded { original: v, .. } => v,
        }
    }

    /// Consume the outcome, returning the string to hand back to the caller.
    pub fn into_value(self) -> String {
        match self {
            DecryptOutcome::Decrypted(v)
            | DecryptOutcome::Legacy(v)
            | DecryptOutcome::Malformed(v)
            | DecryptOutcome::Degraded { original: v, .. } => v,
        }
    }

    /// `true` if decryption was attempted and failed.
    pub fn is_degraded(&self) -> bool {
        matches!(self, DecryptOutcome::Degraded { .. })
    }
}

/// Encrypts and decrypts field values under the current key material.
#[derive(Debug)]
pub struct FieldCipher {
    keys: KeyProvider,
}

impl FieldCipher {
    /// Wrap an existing key provider.
    pub fn new(keys: KeyProvider) -> Self {
        Self { keys }
    }

    /// Build a cipher from validated configuration.
    pub fn from_config(cfg: &CryptoConfig) -> Self {
        Self::new(KeyProvider::from_config(cfg))
    }

    /// The underlying key provider.
    pub fn keys(&self) -> &KeyProvider {
        &self.keys
    }

    /// `true` if an operator secret is configured.
    pub fn is_enabled(&self) -> bool {
        self.keys.is_configured()
    }

    /// Encrypt a field value for storage.
    ///
    /// - empty or absent input → `None`
    /// - disabled: envelopes are decrypted (auto-downgrade), anything else is
    ///   returned unchanged
    /// - enabled: envelopes are returned unchanged, anything else is sealed
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] if sealing fails. Never returned for the
    /// disabled-mode downgrade, which is fail-open.
    pub fn encrypt(&self, plaintext: Option<&str>) -> Result<Option<String>, CipherError> {
        let Some(value) = plaintext.filter(|v| !v.is_empty()) else {
            return Ok(None);
        };

        if !self.is_enabled() {
            if looks_like_envelope(value) {
                return Ok(Some(self.decrypt_outcome(value).into_value()));
            }
            return Ok(Some(value.to_owned()));
        }

        if looks_like_envelope(value) {
            return Ok(Some(value.to_owned()));
        }

        let key = self.keys.derive_key();
        let envelope = Envelope::seal(value.as_bytes(), &key)?;
        Ok(Some(envelope.to_string_repr()))
    }

    /// Decrypt a stored field value, returning the original on any failure.
    pub fn decrypt(&self, value: Option<&str>) -> Option<String> {
        value
            .filter(|v| !v.is_empty())
            .map(|v| self.decrypt_outcome(v).into_value())
    }

    /// Decrypt a stored field value and report how it went.
    pub fn decrypt_outcome(&self, value: &str) -> DecryptOutcome {
        if !value.contains(SEPARATOR) {
            if self.is_enabled() {
                warn!("field value is not an envelope; treating as legacy plaintext");
            } else {
                // Disabled mode stores plaintext, so every read would warn.
                debug!("field value is plaintext");
            }
            return DecryptOutcome::Legacy(value.to_owned());
        }

        if !looks_like_envelope(value) {
            warn!(
                segments = ?segment_lengths(value),
                "field value has separators but is not a valid envelope; treating as plaintext"
            );
            return DecryptOutcome::Malformed(value.to_owned());
        }

        match self.open(value) {
            Ok(plaintext) => DecryptOutcome::Decrypted(plaintext),
            Err(failure) => {
                warn!(
                    error = %failure,
                    segments = ?segment_lengths(value),
                    secret_configured = self.is_enabled(),
                    "field decryption failed; returning stored value unchanged"
                );
                DecryptOutcome::Degraded {
                    original: value.to_owned(),
                    failure,
                }
            }
        }
    }

    fn open(&self, value: &str) -> Result<String, CipherError> {
        let envelope = Envelope::parse(value)?;
        let key = self.keys.derive_key();
        envelope.open_string(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPolicy;

    fn enabled(secret: &str) -> FieldCipher {
        FieldCipher::new(KeyProvider::new(Some(secret.into()), KeyPolicy::Cached))
    }

    fn disabled() -> FieldCipher {
        FieldCipher::new(KeyProvider::new(None, KeyPolicy::Cached))
    }

    fn seal_with(cipher: &FieldCipher, plaintext: &str) -> String {
        Envelope::seal(plaintext.as_bytes(), &cipher.keys().derive_key())
            .unwrap()
            .to_string_repr()
    }

    #[test]
    fn encrypt_produces_envelope_that_decrypts() {
        let c = enabled("s3cret");
        let env = c.encrypt(Some("user@example.com")).unwrap().unwrap();

        let parts: Vec<&str> = env.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 32);
        assert_eq!(parts[2].len(), 32);
        assert!(parts[1].bytes().all(|b| b.is_ascii_hexdigit()));

        assert_eq!(c.decrypt(Some(&env)).as_deref(), Some("user@example.com"));
    }

    #[test]
    fn decrypt_with_recompute_policy() {
        let writer = enabled("s3cret");
        let env = writer.encrypt(Some("Jane")).unwrap().unwrap();

        let reader = FieldCipher::new(KeyProvider::new(Some("s3cret".into()), KeyPolicy::Recompute));
        assert_eq!(reader.decrypt(Some(&env)).as_deref(), Some("Jane"));
    }

    #[test]
    fn empty_and_absent_inputs_are_noops() {
        let c = enabled("s3cret");
        assert_eq!(c.encrypt(None).unwrap(), None);
        assert_eq!(c.encrypt(Some("")).unwrap(), None);
        assert_eq!(c.decrypt(None), None);
        assert_eq!(c.decrypt(Some("")), None);
    }

    #[test]
    fn encrypt_is_idempotent() {
        let c = enabled("s3cret");
        let once = c.encrypt(Some("Finance")).unwrap().unwrap();
        let twice = c.encrypt(Some(&once)).unwrap().unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn envelope_shaped_input_is_not_re_encrypted() {
        let c = enabled("s3cret");
        let input = "aa11bb22:bb22cc33:cc33dd44";
        assert_eq!(c.encrypt(Some(input)).unwrap().as_deref(), Some(input));
    }

    #[test]
    fn disabled_mode_passes_plaintext_through() {
        let c = disabled();
        assert!(!c.is_enabled());
        assert_eq!(
            c.encrypt(Some("user@example.com")).unwrap().as_deref(),
            Some("user@example.com")
        );
    }

    #[test]
    fn disabled_mode_downgrades_readable_envelopes() {
        let c = disabled();
        let env = seal_with(&c, "user@example.com");
        assert_eq!(
            c.encrypt(Some(&env)).unwrap().as_deref(),
            Some("user@example.com")
        );
    }

    #[test]
    fn disabled_mode_keeps_unreadable_envelopes() {
        let env = enabled("s3cret").encrypt(Some("user@example.com")).unwrap().unwrap();
        let c = disabled();
        assert_eq!(c.encrypt(Some(&env)).unwrap().as_deref(), Some(env.as_str()));
    }

    #[test]
    fn disabling_at_runtime_converges_to_plaintext() {
        let c = enabled("s3cret");
        let env = c.encrypt(Some("Ops")).unwrap().unwrap();

        // Decrypt-then-disable: the read path recovers plaintext, the write
        // path in disabled mode leaves it alone.
        let plain = c.decrypt(Some(&env)).unwrap();
        c.keys().set_secret(None);
        let written = c.encrypt(Some(&plain)).unwrap().unwrap();
        assert_eq!(written, "Ops");
        assert_eq!(c.decrypt(Some(&written)).as_deref(), Some("Ops"));
    }

    #[test]
    fn decrypt_legacy_plaintext() {
        let c = enabled("s3cret");
        let out = c.decrypt_outcome("user@example.com");
        assert_eq!(out, DecryptOutcome::Legacy("user@example.com".into()));
        assert!(!out.is_degraded());
    }

    #[test]
    fn decrypt_malformed_returns_input() {
        let c = enabled("s3cret");
        let input = "aa11:not-hex:cc33";
        let out = c.decrypt_outcome(input);
        assert_eq!(out, DecryptOutcome::Malformed(input.into()));
        assert_eq!(c.decrypt(Some(input)).as_deref(), Some(input));

        let two_segments = "10:30";
        assert_eq!(c.decrypt(Some(two_segments)).as_deref(), Some(two_segments));
    }

    #[test]
    fn decrypt_wrong_key_is_degraded() {
        let env = enabled("s3cret").encrypt(Some("x@y.z")).unwrap().unwrap();
        let out = enabled("different").decrypt_outcome(&env);
        assert!(out.is_degraded());
        assert_eq!(out.value(), env);
        assert!(matches!(
            out,
            DecryptOutcome::Degraded {
                failure: CipherError::Aead,
                ..
            }
        ));
    }

    #[test]
    fn decrypt_bad_iv_length_is_degraded() {
        let c = enabled("s3cret");
        let input = "aa11:bb22:cc33";
        let out = c.decrypt_outcome(input);
        assert!(matches!(
            out,
            DecryptOutcome::Degraded {
                failure: CipherError::InvalidLength { segment: "iv", .. },
                ..
            }
        ));
        assert_eq!(out.into_value(), input);
    }

    #[test]
    fn round_trip_preserves_awkward_text() {
        let c = enabled("s3cret");
        for s in ["a:b:c", "  padded  ", "Zoë Ångström", "東京", "line\nbreak", "ab:cd:ef"] {
            let env = c.encrypt(Some(s)).unwrap().unwrap();
            if looks_like_envelope(s) {
                // Envelope-shaped plaintext is indistinguishable from ciphertext.
                assert_eq!(env, s);
            } else {
                assert_eq!(c.decrypt(Some(&env)).as_deref(), Some(s));
            }
        }
    }
}
