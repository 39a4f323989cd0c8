//! Request-scoped context shared by the pipeline stages.
//!
//! Stages communicate only through the request's extensions: the fault
//! boundary inserts [`RequestParams`] and [`ResponseMeta`], the token stage
//! inserts [`TokenContext`], validators replace [`RequestParams`] with their
//! validated copy. Handlers read all of it back through [`ApiContext`].

use std::{convert::Infallible, time::Instant};

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use common::Token;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{envelope, resolver::ApiError};

/// Which part of the request a validator inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// URL query parameters.
    #[default]
    Query,
    /// Decoded JSON or form-urlencoded body.
    Body,
    /// Path parameters captured by the route.
    Params,
}

/// Decoded request parameters.
///
/// Query and form values are strings; JSON bodies keep their structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    pub query: Map<String, Value>,
    pub body: Map<String, Value>,
    pub params: Map<String, Value>,
}

impl RequestParams {
    pub fn target(&self, target: Target) -> &Map<String, Value> {
        match target {
            Target::Query => &self.query,
            Target::Body => &self.body,
            Target::Params => &self.params,
        }
    }

    /// Copy of `self` with one part replaced.
    pub fn with_target(mut self, target: Target, value: Map<String, Value>) -> Self {
        match target {
            Target::Query => self.query = value,
            Target::Body => self.body = value,
            Target::Params => self.params = value,
        }
        self
    }

    /// Caller-supplied correlation token: body `nonce` if set, else query `nonce`.
    ///
    /// Empty, `false`, `0` and `null` body values count as unset.
    pub fn nonce(&self) -> Value {
        self.body
            .get("nonce")
            .filter(|v| is_set(v))
            .or_else(|| self.query.get("nonce"))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Instant at which an upstream layer started timing the request.
#[derive(Debug, Clone, Copy)]
pub struct RequestStart(pub Instant);

/// Token extracted from the `authorization` header, if any.
#[derive(Debug, Clone, Default)]
pub struct TokenContext(pub Option<Token>);

/// What the envelope builder needs to know about the originating request.
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    /// Value echoed back under `nonce`.
    pub nonce: Value,
    /// Set only when request timing is enabled.
    pub started_at: Option<Instant>,
}

impl ResponseMeta {
    pub fn new(nonce: Value, started_at: Option<Instant>) -> Self {
        Self { nonce, started_at }
    }
}

/// Everything a handler needs: validated parameters, token, envelope metadata.
#[derive(Debug, Clone, Default)]
pub struct ApiContext {
    pub params: RequestParams,
    pub token: Option<Token>,
    pub meta: ResponseMeta,
}

impl ApiContext {
    /// Render `payload` as a `200 OK` success envelope.
    pub fn send<T: Serialize>(&self, payload: &T) -> Response {
        self.send_with_status(StatusCode::OK, payload)
    }

    /// Render `payload` as a success envelope with a caller-chosen status.
    pub fn send_with_status<T: Serialize>(&self, status: StatusCode, payload: &T) -> Response {
        match serde_json::to_value(payload) {
            Ok(value) => envelope::respond(status, value, &self.meta, true),
            Err(e) => ApiError::unexpected(e).into_response(),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ApiContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let params = parts
            .extensions
            .get::<RequestParams>()
            .cloned()
            .unwrap_or_default();
        let token = parts
            .extensions
            .get::<TokenContext>()
            .and_then(|t| t.0.clone());
        let meta = parts
            .extensions
            .get::<ResponseMeta>()
            .cloned()
            .unwrap_or_else(|| ResponseMeta::new(params.nonce(), None));
        Ok(Self {
            params,
            token,
            meta,
        })
    }
}
