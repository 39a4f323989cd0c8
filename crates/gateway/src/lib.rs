//! Request-processing core for JSON HTTP services.
//!
//! Provides composable pipeline stages for an Axum router: authorization
//! token extraction, mandatory-parameter validation (including string-encoded
//! nested objects), and a uniform response envelope with a caller-supplied
//! `nonce` and optional timing. Every failure is resolved against an error
//! catalog and rendered through the same envelope; unexpected faults are also
//! reported to a pluggable [`notifier::Notifier`].

pub mod catalog;
pub mod config;
pub mod notifier;
pub mod pipeline;
pub mod server;
pub mod telemetry;
