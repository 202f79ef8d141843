//! Configuration loading and validation for the migration binaries.
//!
//! The operator secret and key policy are read separately by
//! [`fieldcrypt::CryptoConfig::from_env`]; this covers where the data lives.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// File name of the checkpoint when `CHECKPOINT_PATH` is not set.
pub const DEFAULT_CHECKPOINT_FILE: &str = ".pii-migration-checkpoint.json";

/// Validated migration configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MigrateConfig {
    /// Directory holding one `<table>.json` file per entity table. **Required.**
    pub data_dir: String,

    /// Where progress is checkpointed between runs.
    #[serde(default)]
    pub checkpoint_path: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl MigrateConfig {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATA_DIR` is absent or any value is invalid.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build migration configuration")?;

        let c: MigrateConfig = cfg
            .try_deserialize()
            .context("failed to deserialise migration configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Checkpoint file location, defaulting to a dot-file inside `DATA_DIR`.
    pub fn checkpoint_path(&self) -> PathBuf {
        match self.checkpoint_path.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => PathBuf::from(&self.data_dir).join(DEFAULT_CHECKPOINT_FILE),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.data_dir.trim().is_empty() {
            anyhow::bail!("DATA_DIR is required and must not be empty");
        }
        Ok(())
    }
}
