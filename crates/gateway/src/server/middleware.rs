//! Axum middleware layers applied to the router.
//!
//! The fault boundary is the only place failures are rendered: it decodes the
//! request's parameters, runs the rest of the stack, and turns any tagged
//! [`ApiError`] (including caught panics) into a failure envelope. Bare error
//! responses produced by axum itself are rendered the same way.

use std::{any::Any, time::Instant};

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::{ErrorKind, ErrorLike};
use serde_json::{Map, Value};
use tracing::debug;

use super::state::AppState;
use crate::pipeline::{
    context::{RequestParams, RequestStart, ResponseMeta},
    resolver::{ApiError, PendingError},
};

/// Largest request body the boundary will buffer.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Identifier for client errors raised by the framework outside any stage.
pub const REJECTED_REQUEST: &str = "common.rejected_request";

const REJECTION_TEXT_LIMIT: usize = 4 * 1024;

/// Record when the request entered the service, if timing is enabled.
pub async fn record_start(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if state.record_timing {
        req.extensions_mut().insert(RequestStart(Instant::now()));
    }
    next.run(req).await
}

/// Per-request fault boundary.
///
/// Decodes query and body into [`RequestParams`], derives the [`ResponseMeta`]
/// used by every envelope, and renders any [`PendingError`] coming back out
/// of the inner layers. An untagged error response without a JSON body is
/// rendered too, so clients never see a bare framework error.
pub async fn boundary(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started_at = req.extensions().get::<RequestStart>().map(|s| s.0);
    let (mut parts, body) = req.into_parts();
    let query = parse_query(parts.uri.query());

    let early_meta = || {
        let params = RequestParams {
            query: query.clone(),
            ..RequestParams::default()
        };
        ResponseMeta::new(params.nonce(), started_at)
    };

    let bytes = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(b) => b,
        Err(e) => {
            debug!(error = %e, "failed to buffer request body");
            let err = ApiError::shaped(ErrorLike {
                kind: Some("common.payload_too_large".into()),
                code: Some(413),
                message: Some("The request body is too large.".into()),
                status: None,
            });
            return state.resolver.render(err, &early_meta());
        }
    };

    let body_params = match parse_body(&parts.headers, &bytes) {
        Ok(map) => map,
        Err(err) => return state.resolver.render(err, &early_meta()),
    };

    let params = RequestParams {
        query,
        body: body_params,
        params: Map::new(),
    };
    let meta = ResponseMeta::new(params.nonce(), started_at);
    parts.extensions.insert(params);
    parts.extensions.insert(meta.clone());

    let mut response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
    if let Some(PendingError(err)) = response.extensions_mut().remove::<PendingError>() {
        return state.resolver.render(err, &meta);
    }
    if !is_unrendered_failure(&response) {
        return response;
    }
    let err = untagged_failure(response).await;
    state.resolver.render(err, &meta)
}

/// Error status without a JSON body: produced by axum itself (method
/// mismatch, extractor rejections) rather than by a pipeline stage.
fn is_unrendered_failure(response: &Response) -> bool {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return false;
    }
    !is_json(&content_type(response.headers()))
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn is_json(content_type: &str) -> bool {
    content_type.starts_with("application/json") || content_type.contains("+json")
}

/// Map a bare error response onto an [`ApiError`].
///
/// A method mismatch is an unsupported endpoint. Other client errors keep
/// their status and use the rejection text (or the status reason) as the
/// message. Server errors render as `common.unexpected_error`.
async fn untagged_failure(response: Response) -> ApiError {
    let status = response.status();
    if status == StatusCode::METHOD_NOT_ALLOWED {
        return ErrorKind::Unsupported.into();
    }

    let message = if status.is_client_error() {
        axum::body::to_bytes(response.into_body(), REJECTION_TEXT_LIMIT)
            .await
            .ok()
            .and_then(|b| String::from_utf8(b.to_vec()).ok())
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .or_else(|| status.canonical_reason().map(str::to_owned))
    } else {
        None
    };
    debug!(status = status.as_u16(), "rendering untagged error response");

    ApiError::shaped(ErrorLike {
        kind: status
            .is_client_error()
            .then(|| REJECTED_REQUEST.to_owned()),
        code: None,
        message,
        status: Some(status.as_u16()),
    })
}

/// Turn a caught panic into an unexpected-error response for the boundary to render.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "unknown panic payload".to_owned()
    };
    ApiError::unexpected(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}

fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let pairs: Vec<(String, String)> = query
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();
    pairs
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

/// Decode a JSON or form-urlencoded body. Other content types decode to an
/// empty map.
fn parse_body(headers: &HeaderMap, bytes: &Bytes) -> Result<Map<String, Value>, ApiError> {
    if bytes.is_empty() {
        return Ok(Map::new());
    }
    let content_type = content_type(headers);

    if is_json(&content_type) {
        return match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => {
                debug!("JSON body is not an object");
                Err(ErrorKind::InvalidJsonString.into())
            }
            Err(e) => {
                debug!(error = %e, "JSON body does not parse");
                Err(ErrorKind::InvalidJsonString.into())
            }
        };
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes).unwrap_or_default();
        return Ok(pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect());
    }

    Ok(Map::new())
}
