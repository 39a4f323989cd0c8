//! Tracing setup: structured logs, plus OTLP span export when configured.
//!
//! # Telemetry invariants
//!
//! - Access tokens and request bodies never appear in span attributes or log fields.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;

pub use init::init_telemetry;
