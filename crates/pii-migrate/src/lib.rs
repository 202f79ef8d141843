//! Operator-facing migration jobs for the field encryption subsystem.
//!
//! Two binaries share this library:
//! - `encrypt-pii` converts every sensitive field to envelope form.
//! - `decrypt-pii` converts every sensitive field back to plaintext.
//!
//! Both take no arguments; everything comes from the environment.

pub mod config;
pub mod runner;
pub mod store;
pub mod telemetry;
