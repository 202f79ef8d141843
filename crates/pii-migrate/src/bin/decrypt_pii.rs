//! `decrypt-pii`: converts every stored sensitive field back to plaintext.
//!
//! Run with the same `PII_ENCRYPTION_KEY` the data was encrypted under, then
//! remove the key to leave encryption disabled. Safe to re-run.

use std::process::ExitCode;

use fieldcrypt::MigrationDirection;

#[tokio::main]
async fn main() -> ExitCode {
    pii_migrate::runner::main(MigrationDirection::Decrypt).await
}
