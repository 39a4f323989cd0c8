//! Error resolution: every failure becomes a descriptor inside an envelope.
//!
//! Stages and handlers return [`ApiError`]. Its [`IntoResponse`] impl only
//! tags the response; the fault boundary middleware picks the tag up and calls
//! [`ErrorResolver::render`], which has access to the catalog, the notifier
//! and the request's envelope metadata.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{ErrorDescriptor, ErrorKind, ErrorLike};
use serde_json::json;
use tracing::{debug, error, warn};

use super::{context::ResponseMeta, envelope};
use crate::{
    catalog::ErrorCatalog,
    notifier::{Alert, Notifier},
};

/// What went wrong, as the client will see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Catalog identifier, e.g. `"common.missing_required_parameter"`.
    Id(String),
    /// An error that brings its own descriptor fields.
    Shaped(ErrorLike),
}

/// A failure on its way to the client, optionally with the fault behind it.
///
/// The fault (`origin`) is never shown to the client; it is forwarded to the
/// [`Notifier`].
#[derive(Debug, Clone)]
pub struct ApiError {
    pub failure: Failure,
    pub origin: Option<Arc<anyhow::Error>>,
}

impl ApiError {
    /// Failure identified by a catalog identifier.
    pub fn id(identifier: impl Into<String>) -> Self {
        Self {
            failure: Failure::Id(identifier.into()),
            origin: None,
        }
    }

    /// Failure that carries its own descriptor fields.
    pub fn shaped(error: ErrorLike) -> Self {
        Self {
            failure: Failure::Shaped(error),
            origin: None,
        }
    }

    /// Unexpected fault: rendered as `common.unexpected_error`, reported to the notifier.
    pub fn unexpected(err: impl Into<anyhow::Error>) -> Self {
        Self::from(ErrorKind::UnexpectedError).with_origin(err)
    }

    /// Attach the underlying fault for out-of-band reporting.
    pub fn with_origin(mut self, err: impl Into<anyhow::Error>) -> Self {
        self.origin = Some(Arc::new(err.into()));
        self
    }
}

impl From<ErrorKind> for ApiError {
    fn from(kind: ErrorKind) -> Self {
        Self::id(kind.identifier())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err)
    }
}

/// Response extension marking an unrendered [`ApiError`].
#[derive(Debug, Clone)]
pub struct PendingError(pub ApiError);

impl IntoResponse for ApiError {
    /// Placeholder `500` carrying the error. Without the fault boundary in
    /// front of the route this is what the client receives.
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(PendingError(self));
        response
    }
}

/// Turns [`ApiError`]s into failure envelopes.
#[derive(Clone)]
pub struct ErrorResolver {
    catalog: ErrorCatalog,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for ErrorResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorResolver")
            .field("catalog_entries", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl ErrorResolver {
    pub fn new(catalog: ErrorCatalog, notifier: Arc<dyn Notifier>) -> Self {
        Self { catalog, notifier }
    }

    pub fn catalog(&self) -> &ErrorCatalog {
        &self.catalog
    }

    /// Descriptor and HTTP status for a failure.
    ///
    /// Status is the descriptor's code, else the error's own status, else 500.
    pub fn resolve(&self, failure: &Failure) -> (StatusCode, ErrorDescriptor) {
        let (descriptor, own_status) = match failure {
            Failure::Id(id) => match self.catalog.get(id) {
                Some(d) => (d.clone(), None),
                None => {
                    warn!(identifier = %id, "error identifier not in catalog");
                    let fallback = self.catalog.kind(ErrorKind::UnexpectedError);
                    (ErrorDescriptor::new(id.as_str(), fallback.code, fallback.message), None)
                }
            },
            Failure::Shaped(e) => {
                let fallback = self.catalog.kind(ErrorKind::UnexpectedError);
                let code = e.code.or(e.status).unwrap_or(fallback.code);
                let descriptor = ErrorDescriptor::new(
                    e.kind.clone().unwrap_or(fallback.kind),
                    code,
                    e.message.clone().unwrap_or(fallback.message),
                );
                (descriptor, e.status)
            }
        };

        let status = [Some(descriptor.code), own_status]
            .into_iter()
            .flatten()
            .find_map(|c| StatusCode::from_u16(c).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, descriptor)
    }

    /// Resolve, report the origin (if any), and render the failure envelope.
    pub fn render(&self, err: ApiError, meta: &ResponseMeta) -> Response {
        let (status, descriptor) = self.resolve(&err.failure);

        if let Some(origin) = &err.origin {
            error!(kind = %descriptor.kind, error = %format!("{origin:#}"), "request failed");
            self.notify(Alert::from_error(descriptor.kind.as_str(), origin));
        } else {
            debug!(kind = %descriptor.kind, status = status.as_u16(), "request rejected");
        }

        envelope::respond(status, json!({ "error": descriptor }), meta, false)
    }

    fn notify(&self, alert: Alert) {
        let notifier = &self.notifier;
        if catch_unwind(AssertUnwindSafe(|| notifier.error(alert))).is_err() {
            warn!("notifier panicked; alert dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::MockNotifier;
    use serde_json::Value;

    fn resolver_with(notifier: MockNotifier) -> ErrorResolver {
        ErrorResolver::new(ErrorCatalog::builtin(), Arc::new(notifier))
    }

    fn quiet() -> ErrorResolver {
        let mut n = MockNotifier::new();
        n.expect_error().never();
        resolver_with(n)
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn catalog_identifier_sets_status() {
        let (status, d) =
            quiet().resolve(&Failure::Id("common.missing_required_parameter".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(d.kind, "common.missing_required_parameter");
        assert_eq!(d.code, 400);
    }

    #[test]
    fn unknown_identifier_falls_back_to_500() {
        let (status, d) = quiet().resolve(&Failure::Id("billing.card_declined".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(d.kind, "billing.card_declined");
        assert_eq!(d.code, 500);
    }

    #[test]
    fn shaped_error_uses_own_code() {
        let (status, d) = quiet().resolve(&Failure::Shaped(ErrorLike {
            kind: Some("common.unsupported".into()),
            code: Some(404),
            message: Some("Unsupported API".into()),
            status: None,
        }));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(d.message, "Unsupported API");
    }

    #[test]
    fn shaped_error_falls_back_to_status_then_500() {
        let (status, d) = quiet().resolve(&Failure::Shaped(ErrorLike {
            status: Some(413),
            ..ErrorLike::default()
        }));
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(d.code, 413);
        assert_eq!(d.kind, "common.unexpected_error");

        let (status, _) = quiet().resolve(&Failure::Shaped(ErrorLike::default()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_code_renders_500() {
        let (status, _) = quiet().resolve(&Failure::Shaped(ErrorLike {
            code: Some(42),
            ..ErrorLike::default()
        }));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn render_builds_failure_envelope() {
        let meta = ResponseMeta::new(Value::from("n-1"), None);
        let resp = quiet().render(ErrorKind::MissingRequiredParameter.into(), &meta);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert_eq!(v["success"], false);
        assert_eq!(v["nonce"], "n-1");
        assert_eq!(v["error"]["type"], "common.missing_required_parameter");
        assert_eq!(v["error"]["code"], 400);
        assert!(v["error"]["message"].is_string());
    }

    #[tokio::test]
    async fn origin_is_forwarded_to_notifier() {
        let mut n = MockNotifier::new();
        n.expect_error()
            .withf(|alert| alert.kind == "common.unexpected_error" && alert.message == "db down")
            .times(1)
            .return_const(());
        let resolver = resolver_with(n);

        let resp = resolver.render(
            ApiError::unexpected(anyhow::anyhow!("db down")),
            &ResponseMeta::default(),
        );
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = body_json(resp).await;
        // the fault itself never reaches the client
        assert!(!v.to_string().contains("db down"));
    }

    #[tokio::test]
    async fn panicking_notifier_does_not_break_response() {
        let mut n = MockNotifier::new();
        n.expect_error().returning(|_| panic!("alert transport exploded"));
        let resolver = resolver_with(n);

        let resp = resolver.render(
            ApiError::from(ErrorKind::InvalidJsonString).with_origin(anyhow::anyhow!("eof")),
            &ResponseMeta::default(),
        );
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["type"], "common.invalid_json_string");
    }

    #[test]
    fn into_response_tags_pending_error() {
        let resp = ApiError::from(ErrorKind::Unsupported).into_response();
        let pending = resp.extensions().get::<PendingError>().unwrap();
        assert_eq!(pending.0.failure, Failure::Id("common.unsupported".into()));
    }
}
