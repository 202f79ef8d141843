//! Single-record encrypt and decrypt.

use common::record::{field_value, Record};
use tracing::{error, warn};

use super::RecordTransformer;
use crate::crypto::CipherError;
use crate::policy::{EntityKind, SensitiveField};

/// A decrypted record plus the fields that failed open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedRecord {
    /// Record with every decryptable field replaced by its plaintext.
    pub record: Record,
    /// Fields that looked like envelopes but could not be decrypted; they
    /// still hold the stored ciphertext.
    pub degraded: Vec<SensitiveField>,
}

impl CheckedRecord {
    /// `true` if every sensitive field came back usable.
    pub fn is_clean(&self) -> bool {
        self.degraded.is_empty()
    }
}

impl RecordTransformer<'_> {
    /// Return a copy of `record` with each listed, non-empty field encrypted.
    ///
    /// Fields not listed, absent, null or empty are copied unchanged.
    ///
    /// # Errors
    ///
    /// Propagates the first [`CipherError`] from the cipher; the write should
    /// be aborted rather than persisting plaintext.
    pub fn encrypt_fields(
        &self,
        record: &Record,
        fields: &[SensitiveField],
    ) -> Result<Record, CipherError> {
        let mut out = record.clone();
        for &field in fields {
            let Some(value) = field_value(record, field.as_str()) else {
                continue;
            };
            let encrypted = self.cipher.encrypt(Some(value)).map_err(|e| {
                error!(field = %field, error = %e, "field encryption failed");
                e
            })?;
            out.insert(field.as_str().to_owned(), encrypted);
        }
        Ok(out)
    }

    /// Return a copy of `record` with each listed field decrypted.
    ///
    /// A field is only overwritten when decryption produced a different value,
    /// so plaintext fields and fields that failed open keep their stored value.
    pub fn decrypt_fields(&self, record: &Record, fields: &[SensitiveField]) -> Record {
        self.decrypt_fields_checked(record, fields).record
    }

    /// Like [`decrypt_fields`](Self::decrypt_fields), also reporting which
    /// fields could not be decrypted.
    pub fn decrypt_fields_checked(
        &self,
        record: &Record,
        fields: &[SensitiveField],
    ) -> CheckedRecord {
        let mut out = record.clone();
        let mut degraded = Vec::new();

        for &field in fields {
            let Some(value) = field_value(record, field.as_str()) else {
                continue;
            };
            let outcome = self.cipher.decrypt_outcome(value);
            if outcome.is_degraded() {
                warn!(field = %field, "sensitive field returned without decryption");
                degraded.push(field);
            }
            if outcome.value() != value {
                out.insert(field.as_str().to_owned(), Some(outcome.into_value()));
            }
        }

        CheckedRecord {
            record: out,
            degraded,
        }
    }

    /// [`encrypt_fields`](Self::encrypt_fields) with the registry's field list for `kind`.
    ///
    /// # Errors
    ///
    /// See [`encrypt_fields`](Self::encrypt_fields).
    pub fn encrypt_entity(&self, kind: EntityKind, record: &Record) -> Result<Record, CipherError> {
        self.encrypt_fields(record, kind.sensitive_fields())
    }

    /// [`decrypt_fields`](Self::decrypt_fields) with the registry's field list for `kind`.
    pub fn decrypt_entity(&self, kind: EntityKind, record: &Record) -> Record {
        self.decrypt_fields(record, kind.sensitive_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{looks_like_envelope, FieldCipher, KeyPolicy, KeyProvider};

    fn cipher(secret: Option<&str>) -> FieldCipher {
        FieldCipher::new(KeyProvider::new(secret.map(str::to_owned), KeyPolicy::Cached))
    }

    fn user() -> Record {
        let mut r = Record::new();
        r.insert("id".into(), Some("17".into()));
        r.insert("username".into(), Some("jdoe".into()));
        r.insert("email".into(), Some("jdoe@example.com".into()));
        r.insert("firstName".into(), Some("Jane".into()));
        r.insert("lastName".into(), Some(String::new()));
        r.insert("department".into(), None);
        r
    }

    fn get<'r>(r: &'r Record, k: &str) -> Option<&'r str> {
        r.get(k).and_then(|v| v.as_deref())
    }

    #[test]
    fn encrypt_touches_only_listed_non_empty_fields() {
        let c = cipher(Some("s3cret"));
        let t = RecordTransformer::new(&c);
        let input = user();
        let out = t.encrypt_entity(EntityKind::User, &input).unwrap();

        assert!(looks_like_envelope(get(&out, "email").unwrap()));
        assert!(looks_like_envelope(get(&out, "firstName").unwrap()));
        assert_eq!(get(&out, "lastName"), Some(""));
        assert_eq!(out.get("department"), Some(&None));
        assert_eq!(get(&out, "id"), Some("17"));
        assert_eq!(get(&out, "username"), Some("jdoe"));

        // Input not mutated.
        assert_eq!(input, user());
    }

    #[test]
    fn decrypt_restores_encrypted_record() {
        let c = cipher(Some("s3cret"));
        let t = RecordTransformer::new(&c);
        let encrypted = t.encrypt_entity(EntityKind::User, &user()).unwrap();
        assert_eq!(t.decrypt_entity(EntityKind::User, &encrypted), user());
    }

    #[test]
    fn decrypt_leaves_plaintext_fields_alone() {
        let c = cipher(Some("s3cret"));
        let t = RecordTransformer::new(&c);
        assert_eq!(t.decrypt_entity(EntityKind::User, &user()), user());
    }

    #[test]
    fn decrypt_checked_reports_degraded_fields() {
        let writer = cipher(Some("s3cret"));
        let encrypted = RecordTransformer::new(&writer)
            .encrypt_entity(EntityKind::User, &user())
            .unwrap();

        let reader = cipher(Some("wrong"));
        let checked = RecordTransformer::new(&reader)
            .decrypt_fields_checked(&encrypted, EntityKind::User.sensitive_fields());

        assert!(!checked.is_clean());
        assert_eq!(
            checked.degraded,
            vec![SensitiveField::Email, SensitiveField::FirstName]
        );
        // Failed fields keep the stored ciphertext.
        assert_eq!(checked.record, encrypted);
    }

    #[test]
    fn disabled_encrypt_is_noop_on_plaintext() {
        let c = cipher(None);
        let t = RecordTransformer::new(&c);
        assert_eq!(t.encrypt_entity(EntityKind::User, &user()).unwrap(), user());
    }

    #[test]
    fn disabled_encrypt_downgrades_envelopes() {
        let c = cipher(None);
        let t = RecordTransformer::new(&c);
        // Envelopes readable with the current key material.
        let mut stored = user();
        let key = c.keys().derive_key();
        let env = crate::crypto::Envelope::seal(b"jdoe@example.com", &key).unwrap();
        stored.insert("email".into(), Some(env.to_string_repr()));

        assert_eq!(t.encrypt_entity(EntityKind::User, &stored).unwrap(), user());
    }

    #[test]
    fn encrypt_is_idempotent_per_record() {
        let c = cipher(Some("s3cret"));
        let t = RecordTransformer::new(&c);
        let once = t.encrypt_entity(EntityKind::User, &user()).unwrap();
        let twice = t.encrypt_entity(EntityKind::User, &once).unwrap();
        assert_eq!(once, twice);
    }
}
