//! Configuration loading and validation for the field encryption subsystem.
//!
//! Values are read from environment variables once, at startup, and the
//! resulting [`CryptoConfig`] is passed by reference into the subsystem. The
//! operator secret is the only switch: when it is absent encryption is disabled.

use std::fmt;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::KeyPolicy;

/// Default number of records decrypted per batch chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Validated field encryption configuration.
#[derive(Clone, Deserialize)]
pub struct CryptoConfig {
    /// Operator secret. Encryption is enabled iff this is set and non-blank.
    #[serde(default)]
    pub pii_encryption_key: Option<String>,

    /// Cache derived key material instead of re-deriving on every call.
    #[serde(default)]
    pub pii_key_cache: bool,

    /// Records per chunk in batch decryption.
    #[serde(default = "default_chunk_size")]
    pub pii_batch_chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl CryptoConfig {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed, or if
    /// validation fails.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build field encryption configuration from environment")?;

        let c: CryptoConfig = cfg
            .try_deserialize()
            .context("failed to deserialise field encryption configuration")?;

        let c = c.normalised();
        c.validate()?;
        Ok(c)
    }

    /// Configuration with the given operator secret and default settings.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            pii_encryption_key: Some(secret.into()),
            ..Self::disabled()
        }
    }

    /// Configuration with no operator secret (encryption disabled).
    pub fn disabled() -> Self {
        Self {
            pii_encryption_key: None,
            pii_key_cache: false,
            pii_batch_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Enable or disable key caching.
    pub fn key_cache(mut self, enabled: bool) -> Self {
        self.pii_key_cache = enabled;
        self
    }

    /// The operator secret, if one is configured.
    pub fn secret(&self) -> Option<&str> {
        self.pii_encryption_key.as_deref()
    }

    /// Key derivation policy selected by this configuration.
    pub fn key_policy(&self) -> KeyPolicy {
        if self.pii_key_cache {
            KeyPolicy::Cached
        } else {
            KeyPolicy::Recompute
        }
    }

    /// Treat a blank secret the same as an absent one.
    fn normalised(mut self) -> Self {
        if self
            .pii_encryption_key
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            self.pii_encryption_key = None;
        }
        self
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.pii_batch_chunk_size == 0 {
            anyhow::bail!("PII_BATCH_CHUNK_SIZE must be > 0");
        }
        Ok(())
    }
}

impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field(
                "pii_encryption_key",
                &self.pii_encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("pii_key_cache", &self.pii_key_cache)
            .field("pii_batch_chunk_size", &self.pii_batch_chunk_size)
            .finish()
    }
}
