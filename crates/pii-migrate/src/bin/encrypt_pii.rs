//! `encrypt-pii`: converts every stored sensitive field to envelope form.
//!
//! Requires `PII_ENCRYPTION_KEY`. Safe to re-run; values already encrypted
//! are skipped.

use std::process::ExitCode;

use fieldcrypt::MigrationDirection;

#[tokio::main]
async fn main() -> ExitCode {
    pii_migrate::runner::main(MigrationDirection::Encrypt).await
}
