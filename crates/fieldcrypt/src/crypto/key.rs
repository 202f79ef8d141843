//! [`KeyProvider`]: derives the 32-byte field encryption key from the operator secret.
//!
//! The key is PBKDF2-HMAC-SHA512 over the secret with a fixed salt. Without a
//! secret the same derivation runs over a hardcoded development seed, which is
//! insecure by construction and announced loudly on every derivation.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::CryptoConfig;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Fixed KDF salt. Changing it makes every stored envelope unreadable.
pub const KDF_SALT: &[u8] = b"fieldcrypt-pii-field-encryption-salt";

/// Seed used when no operator secret is configured. Development only.
pub const INSECURE_FALLBACK_SEED: &str = "fieldcrypt-insecure-development-key-do-not-use-in-production";

const INSECURE_BANNER: &str = "\
################################################################################
#  WARNING: PII_ENCRYPTION_KEY is not set.                                     #
#  Field encryption key derived from the built-in development seed.            #
#  Anyone with this source can decrypt data protected by it.                   #
#  Set PII_ENCRYPTION_KEY before handling real personal data.                  #
################################################################################";

/// Where the bytes of a [`DerivedKey`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Derived from a configured operator secret.
    OperatorSecret,
    /// Derived from [`INSECURE_FALLBACK_SEED`].
    InsecureFallback,
}

/// Whether derived key material may be reused across calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Re-run the KDF on every call so the key always reflects the current secret.
    #[default]
    Recompute,
    /// Reuse the last derived key until the secret changes.
    Cached,
}

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// The memory is wiped on drop.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
    origin: KeyOrigin,
}

impl DerivedKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Whether this key came from a real secret or the fallback seed.
    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
            origin: KeyOrigin::OperatorSecret,
        }
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        write!(f, "DerivedKey([REDACTED], {:?})", self.origin)
    }
}

/// A cached key bound to the exact secret instance it was derived from.
struct CachedKey {
    secret: Option<Arc<String>>,
    key: Arc<DerivedKey>,
}

/// Thread-safe source of field encryption keys.
///
/// The current secret lives in an [`ArcSwapOption`] so it can be replaced at
/// runtime. Under [`KeyPolicy::Cached`] the last derived key is kept together
/// with the `Arc` of the secret it came from; a lookup only hits when that
/// `Arc` is still the current one, so replacing the secret invalidates the
/// cache even when a derivation races with the swap.
pub struct KeyProvider {
    secret: ArcSwapOption<String>,
    policy: KeyPolicy,
    cache: ArcSwapOption<CachedKey>,
}

impl KeyProvider {
    /// Create a provider for `secret`. A blank secret counts as absent.
    pub fn new(secret: Option<String>, policy: KeyPolicy) -> Self {
        Self {
            secret: ArcSwapOption::new(normalise(secret).map(Arc::new)),
            policy,
            cache: ArcSwapOption::empty(),
        }
    }

    /// Create a provider from validated configuration.
    pub fn from_config(cfg: &CryptoConfig) -> Self {
        Self::new(cfg.secret().map(str::to_owned), cfg.key_policy())
    }

    /// Returns `true` if a real operator secret is configured.
    ///
    /// Read on every call; never cached.
    pub fn is_configured(&self) -> bool {
        self.secret.load().is_some()
    }

    /// Replace the operator secret and drop any cached key.
    pub fn set_secret(&self, secret: Option<String>) {
        self.secret.store(normalise(secret).map(Arc::new));
        self.cache.store(None);
        debug!(configured = self.is_configured(), "operator secret replaced");
    }

    /// Return the key for the current secret.
    ///
    /// Runs the KDF unless the policy is [`KeyPolicy::Cached`] and a key for
    /// the current secret is already held.
    pub fn derive_key(&self) -> Arc<DerivedKey> {
        let secret = self.secret.load_full();

        if self.policy == KeyPolicy::Cached {
            if let Some(entry) = self.cache.load_full() {
                if same_secret(entry.secret.as_ref(), secret.as_ref()) {
                    return Arc::clone(&entry.key);
                }
            }
        }

        let key = Arc::new(derive(secret.as_deref().map(String::as_str)));

        if self.policy == KeyPolicy::Cached {
            self.cache.store(Some(Arc::new(CachedKey {
                secret,
                key: Arc::clone(&key),
            })));
        }
        key
    }
}

impl fmt::Debug for KeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyProvider")
            .field("configured", &self.is_configured())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn normalise(secret: Option<String>) -> Option<String> {
    secret.filter(|s| !s.trim().is_empty())
}

fn same_secret(cached: Option<&Arc<String>>, current: Option<&Arc<String>>) -> bool {
    match (cached, current) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn derive(secret: Option<&str>) -> DerivedKey {
    let (password, origin) = match secret {
        Some(s) => (s, KeyOrigin::OperatorSecret),
        None => {
            announce_insecure_fallback();
            (INSECURE_FALLBACK_SEED, KeyOrigin::InsecureFallback)
        }
    };

    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha512>(password.as_bytes(), KDF_SALT, PBKDF2_ITERATIONS, bytes.as_mut_slice());
    DerivedKey { bytes, origin }
}

fn announce_insecure_fallback() {
    warn!(
        origin = "insecure_fallback",
        "PII_ENCRYPTION_KEY is not set; deriving the field key from the built-in development seed"
    );
    eprintln!("{INSECURE_BANNER}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_secret_derives_same_key() {
        let a = KeyProvider::new(Some("s3cret".into()), KeyPolicy::Recompute);
        let b = KeyProvider::new(Some("s3cret".into()), KeyPolicy::Recompute);
        assert_eq!(a.derive_key().as_bytes(), b.derive_key().as_bytes());
    }

    #[test]
    fn different_secrets_derive_different_keys() {
        let a = KeyProvider::new(Some("s3cret".into()), KeyPolicy::Recompute);
        let b = KeyProvider::new(Some("other".into()), KeyPolicy::Recompute);
        assert_ne!(a.derive_key().as_bytes(), b.derive_key().as_bytes());
    }

    #[test]
    fn missing_secret_uses_fallback_seed() {
        let p = KeyProvider::new(None, KeyPolicy::Recompute);
        assert!(!p.is_configured());
        let key = p.derive_key();
        assert_eq!(key.origin(), KeyOrigin::InsecureFallback);

        let explicit = KeyProvider::new(Some(INSECURE_FALLBACK_SEED.into()), KeyPolicy::Recompute);
        assert_eq!(key.as_bytes(), explicit.derive_key().as_bytes());
    }

    #[test]
    fn blank_secret_is_not_configured() {
        let p = KeyProvider::new(Some("  ".into()), KeyPolicy::Recompute);
        assert!(!p.is_configured());
    }

    #[test]
    fn recompute_policy_derives_fresh_key_each_call() {
        let p = KeyProvider::new(Some("s3cret".into()), KeyPolicy::Recompute);
        let k1 = p.derive_key();
        let k2 = p.derive_key();
        assert!(!Arc::ptr_eq(&k1, &k2));
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn cached_policy_reuses_key() {
        let p = KeyProvider::new(Some("s3cret".into()), KeyPolicy::Cached);
        let k1 = p.derive_key();
        let k2 = p.derive_key();
        assert!(Arc::ptr_eq(&k1, &k2));
    }

    #[test]
    fn set_secret_invalidates_cache() {
        let p = KeyProvider::new(Some("s3cret".into()), KeyPolicy::Cached);
        let before = p.derive_key();

        p.set_secret(Some("rotated".into()));
        let after = p.derive_key();
        assert_ne!(before.as_bytes(), after.as_bytes());

        // Same value, new instance: still re-derived, and equal to a fresh derivation.
        p.set_secret(Some("s3cret".into()));
        let again = p.derive_key();
        assert!(!Arc::ptr_eq(&before, &again));
        assert_eq!(before.as_bytes(), again.as_bytes());
    }

    #[test]
    fn set_secret_none_disables() {
        let p = KeyProvider::new(Some("s3cret".into()), KeyPolicy::Cached);
        assert!(p.is_configured());
        p.set_secret(None);
        assert!(!p.is_configured());
        assert_eq!(p.derive_key().origin(), KeyOrigin::InsecureFallback);
    }

    #[test]
    fn key_buffer_is_wiped_on_drop() {
        fn wiped_on_drop<T: zeroize::ZeroizeOnDrop>(_: &T) {}
        let key = DerivedKey::from_bytes([0xAB; KEY_LEN]);
        wiped_on_drop(&key.bytes);
        assert_eq!(key.as_bytes(), &[0xAB; KEY_LEN]);
    }

    #[test]
    fn derived_key_redacted_in_debug() {
        let key = DerivedKey::from_bytes([0xAB; KEY_LEN]);
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("171"));
    }
}
