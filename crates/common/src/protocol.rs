//! Types that appear on the wire.
//!
//! Every response body is an envelope: the handler's payload fields plus
//! `success`, `nonce` and, when timing is enabled, `elapsed_time`. Failure
//! envelopes carry an [`ErrorDescriptor`] under `error`. The types here
//! describe the pieces that have a fixed shape.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Credential pair parsed from an `authorization: <grant_type> <access_token>` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Credential scheme label, e.g. `"Bearer"`.
    pub grant_type: String,
    /// Opaque access token.
    pub access_token: String,
}

// ---------------------------------------------------------------------------
// Error descriptor
// ---------------------------------------------------------------------------

/// One entry of the error catalog, rendered under `error` in failure envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Stable identifier, e.g. `"common.missing_required_parameter"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// HTTP status code sent with this error.
    pub code: u16,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorDescriptor {
    /// Construct an [`ErrorDescriptor`] from its three parts.
    pub fn new(kind: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            code,
            message: message.into(),
        }
    }
}

impl From<ErrorKind> for ErrorDescriptor {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind.identifier(), kind.default_code(), kind.default_message())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Payload of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Number of descriptors in the loaded error catalog.
    pub catalog_entries: usize,
}
