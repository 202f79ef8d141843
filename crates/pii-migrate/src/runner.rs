//! Shared entry point for the migration binaries.
//!
//! Startup sequence:
//! 1. Load and validate [`MigrateConfig`] and [`CryptoConfig`] from environment variables.
//! 2. Initialise structured JSON logging.
//! 3. Open the data directory and checkpoint file.
//! 4. Install a Ctrl-C handler that cancels the job between rows.
//! 5. Run the job on a blocking thread and print the report.

use std::process::ExitCode;

use anyhow::{Context, Result};
use common::report::EXIT_FATAL;
use common::MigrationReport;
use fieldcrypt::{CryptoConfig, FieldCipher, MigrationDirection, MigrationJob};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::MigrateConfig;
use crate::store::{FileCheckpointStore, JsonDirStore};
use crate::telemetry;

/// Run a migration in `direction` and map the outcome to a process status.
pub async fn main(direction: MigrationDirection) -> ExitCode {
    match run(direction).await {
        Ok(report) => {
            println!("{report}");
            ExitCode::from(report.exit_code())
        }
        Err(e) => {
            error!(direction = %direction, error = %e, "migration aborted");
            eprintln!("ERROR: {direction} migration aborted: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Run a migration in `direction` to completion or cancellation.
///
/// # Errors
///
/// Returns an error on invalid configuration, an unreadable data directory,
/// or a fatal [`fieldcrypt::MigrationError`].
pub async fn run(direction: MigrationDirection) -> Result<MigrationReport> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = MigrateConfig::from_env()?;
    let crypto = CryptoConfig::from_env()?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        direction = %direction,
        data_dir = %cfg.data_dir,
        encryption_enabled = crypto.secret().is_some(),
        "pii migration starting"
    );

    // -----------------------------------------------------------------------
    // 3. Stores
    // -----------------------------------------------------------------------
    let mut store = JsonDirStore::open(&cfg.data_dir).context("failed to open data directory")?;
    let mut checkpoints = FileCheckpointStore::new(cfg.checkpoint_path());

    // -----------------------------------------------------------------------
    // 4. Cancellation
    // -----------------------------------------------------------------------
    let token = CancellationToken::new();
    let _signal = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; stopping after the current row");
                token.cancel();
            }
        })
    };

    // -----------------------------------------------------------------------
    // 5. Job
    // -----------------------------------------------------------------------
    let report = tokio::task::spawn_blocking(move || {
        let cipher = FieldCipher::from_config(&crypto);
        MigrationJob::new(&cipher, direction)
            .with_cancellation(token)
            .run(&mut store, &mut checkpoints)
    })
    .await
    .context("migration task panicked")??;

    Ok(report)
}
