//! Authorization token stages.
//!
//! [`extract`] runs once per request and records the token (or its absence)
//! in the request's extensions. [`require`] is a route layer for endpoints that
//! cannot be served without one.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use common::{ErrorKind, Token};

use super::{context::TokenContext, resolver::ApiError};

/// Parse `authorization: <grant_type> <access_token>`.
///
/// A missing header is not an error. A header that does not split on a single
/// space into exactly two non-empty parts is `common.invalid_authentication`.
pub fn parse_authorization(headers: &HeaderMap) -> Result<Option<Token>, ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::from(ErrorKind::InvalidAuthentication))?;

    let segments: Vec<&str> = value.split(' ').collect();
    match segments.as_slice() {
        [grant_type, access_token] if !grant_type.is_empty() && !access_token.is_empty() => {
            Ok(Some(Token {
                grant_type: (*grant_type).to_owned(),
                access_token: (*access_token).to_owned(),
            }))
        }
        _ => Err(ErrorKind::InvalidAuthentication.into()),
    }
}

/// Record the request's token in its extensions, or halt on a malformed header.
pub async fn extract(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = parse_authorization(req.headers())?;
    req.extensions_mut().insert(TokenContext(token));
    Ok(next.run(req).await)
}

/// Halt with `common.not_exist_token` unless [`extract`] found a token.
pub async fn require(req: Request, next: Next) -> Result<Response, ApiError> {
    let present = req
        .extensions()
        .get::<TokenContext>()
        .is_some_and(|t| t.0.is_some());
    if !present {
        return Err(ErrorKind::NotExistToken.into());
    }
    Ok(next.run(req).await)
}
