//! Error taxonomy shared across crates.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known error identifiers.
///
/// Each kind has a stable catalog identifier and a built-in descriptor that is
/// used unless the deployment's catalog file overrides it:
/// - [`ErrorKind::InvalidAuthentication`] → 401
/// - [`ErrorKind::NotExistToken`] → 401
/// - [`ErrorKind::MissingRequiredParameter`] → 400
/// - [`ErrorKind::InvalidJsonString`] → 400
/// - [`ErrorKind::Unsupported`] → 404
/// - [`ErrorKind::UnexpectedError`] → 500
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The `authorization` header is not `<grant_type> <access_token>`.
    InvalidAuthentication,
    /// The route requires a token but the request carried none.
    NotExistToken,
    /// A mandatory parameter (or nested subfield) is absent.
    MissingRequiredParameter,
    /// A JSON body or string-encoded nested object could not be decoded.
    InvalidJsonString,
    /// No route matches the request.
    Unsupported,
    /// A fault with no matching catalog identifier.
    UnexpectedError,
}

impl ErrorKind {
    /// Every kind, in catalog order.
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::InvalidAuthentication,
        ErrorKind::NotExistToken,
        ErrorKind::MissingRequiredParameter,
        ErrorKind::InvalidJsonString,
        ErrorKind::Unsupported,
        ErrorKind::UnexpectedError,
    ];

    /// Catalog identifier, e.g. `"common.missing_required_parameter"`.
    pub fn identifier(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAuthentication => "common.invalid_authentication",
            ErrorKind::NotExistToken => "common.not_exist_token",
            ErrorKind::MissingRequiredParameter => "common.missing_required_parameter",
            ErrorKind::InvalidJsonString => "common.invalid_json_string",
            ErrorKind::Unsupported => "common.unsupported",
            ErrorKind::UnexpectedError => "common.unexpected_error",
        }
    }

    /// Built-in HTTP status code for this kind.
    pub fn default_code(&self) -> u16 {
        match self {
            ErrorKind::InvalidAuthentication | ErrorKind::NotExistToken => 401,
            ErrorKind::MissingRequiredParameter | ErrorKind::InvalidJsonString => 400,
            ErrorKind::Unsupported => 404,
            ErrorKind::UnexpectedError => 500,
        }
    }

    /// Built-in client-facing message for this kind.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAuthentication => "The authorization header is malformed.",
            ErrorKind::NotExistToken => "The request requires an access token.",
            ErrorKind::MissingRequiredParameter => "The request is missing a required parameter.",
            ErrorKind::InvalidJsonString => "The request contains an invalid JSON string.",
            ErrorKind::Unsupported => "Unsupported API",
            ErrorKind::UnexpectedError => "An unexpected error occurred.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Returned when parsing an identifier that is not a built-in [`ErrorKind`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown error kind: {0}")]
pub struct UnknownErrorKind(pub String);

impl FromStr for ErrorKind {
    type Err = UnknownErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|k| k.identifier() == s)
            .ok_or_else(|| UnknownErrorKind(s.to_owned()))
    }
}

/// An error that already looks like a descriptor.
///
/// Produced by collaborators that build their own `{type, code, message}`
/// objects instead of naming a catalog identifier. Any part may be missing;
/// `status` is the error's own HTTP status, consulted when `code` is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLike {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}
