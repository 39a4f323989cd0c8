//! Built-in handlers. Application endpoints are supplied by the caller of
//! [`super::router::build`].

use axum::{extract::State, response::Response};
use common::{protocol::HealthResponse, ErrorKind};

use super::state::AppState;
use crate::pipeline::{ApiContext, ApiError};

/// `GET /health`: liveness check answered in the standard envelope.
pub async fn health(State(state): State<AppState>, ctx: ApiContext) -> Response {
    ctx.send(&HealthResponse {
        status: "ok".into(),
        catalog_entries: state.resolver.catalog().len(),
    })
}

/// Catch-all: `common.unsupported` (404).
pub async fn unsupported() -> ApiError {
    ErrorKind::Unsupported.into()
}
