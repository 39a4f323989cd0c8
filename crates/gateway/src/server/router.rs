//! Axum router construction.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};
use crate::pipeline::token;

/// Build the service [`Router`]: `routes` plus the built-in endpoints, wrapped
/// in the shared pipeline.
///
/// Layers, outermost first: request tracing → timing → fault boundary →
/// panic catcher → token extraction. Route-specific checks go on `routes`
/// with `route_layer` and run after token extraction.
pub fn build(state: AppState, routes: Router<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(routes)
        .fallback(handlers::unsupported)
        .layer(from_fn(token::extract))
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .layer(from_fn_with_state(state.clone(), middleware::boundary))
        .layer(from_fn_with_state(state.clone(), middleware::record_start))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
        routing::post,
        Json,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::catalog::ErrorCatalog;
    use crate::notifier::MockNotifier;
    use crate::pipeline::{mandatory, ApiContext, Mandatory, Target, ValidationSpec};

    async fn channel(ctx: ApiContext) -> Response {
        let channel = ctx.params.body.get("channel").cloned().unwrap_or(Value::Null);
        ctx.send(&json!({ "channel": channel }))
    }

    async fn lookup(ctx: ApiContext) -> Response {
        ctx.send(&json!({ "ch_no": ctx.params.query.get("ch_no") }))
    }

    async fn boom() -> Response {
        panic!("handler exploded")
    }

    async fn typed(ctx: ApiContext, Json(payload): Json<Value>) -> Response {
        ctx.send(&json!({ "echo": payload }))
    }

    fn routes() -> Router<AppState> {
        let by_query = Arc::new(Mandatory::new(["ch_no"]));
        let by_body = Arc::new(
            Mandatory::new(ValidationSpec::groups([("channel", ["ch_no"])])).target(Target::Body),
        );
        Router::new()
            .route(
                "/lookup",
                get(lookup).route_layer(from_fn_with_state(by_query, mandatory::enforce)),
            )
            .route(
                "/channels",
                post(channel)
                    .route_layer(from_fn_with_state(by_body, mandatory::enforce))
                    .route_layer(from_fn(token::require)),
            )
            .route("/boom", get(boom))
            .route("/typed", post(typed))
    }

    fn app(state: AppState) -> Router {
        build(state, routes())
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn form_post(uri: &str, auth: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_route_returns_unsupported_envelope() {
        let (status, body) = send(app(AppState::default()), get_req("/unknown?nonce=n1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "common.unsupported");
        assert_eq!(body["error"]["code"], 404);
        assert_eq!(body["success"], false);
        assert_eq!(body["nonce"], "n1");
    }

    #[tokio::test]
    async fn health_route_answers_in_envelope() {
        let (status, body) = send(app(AppState::default()), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["success"], true);
        assert_eq!(body["nonce"], Value::Null);
        assert!(body.get("elapsed_time").is_none());
    }

    #[tokio::test]
    async fn malformed_authorization_halts_pipeline() {
        let req = Request::builder()
            .uri("/lookup?ch_no=1&nonce=z")
            .header(header::AUTHORIZATION, "Bearer")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(AppState::default()), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "common.invalid_authentication");
        assert_eq!(body["success"], false);
        assert_eq!(body["nonce"], "z");
    }

    #[tokio::test]
    async fn missing_query_parameter_is_rejected() {
        let (status, body) = send(app(AppState::default()), get_req("/lookup")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "common.missing_required_parameter");
    }

    #[tokio::test]
    async fn present_query_parameter_reaches_handler() {
        let (status, body) = send(app(AppState::default()), get_req("/lookup?ch_no=7")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ch_no"], "7");
    }

    #[tokio::test]
    async fn string_encoded_group_is_decoded_for_handler() {
        let req = form_post(
            "/channels?nonce=abc",
            "Bearer t0k",
            "channel=%7B%22ch_no%22%3A%222%22%7D",
        );
        let (status, body) = send(app(AppState::default()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"channel": {"ch_no": "2"}, "success": true, "nonce": "abc"})
        );
    }

    #[tokio::test]
    async fn malformed_string_group_is_invalid_json() {
        let req = form_post("/channels", "Bearer t0k", "channel=%7Bch_no");
        let (status, body) = send(app(AppState::default()), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "common.invalid_json_string");
    }

    #[tokio::test]
    async fn token_required_route_without_token() {
        let req = Request::builder()
            .method("POST")
            .uri("/channels")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"channel":{"ch_no":"2"},"nonce":"b1"}"#))
            .unwrap();
        let (status, body) = send(app(AppState::default()), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "common.not_exist_token");
        assert_eq!(body["nonce"], "b1");
    }

    #[tokio::test]
    async fn malformed_json_body_is_rendered() {
        let req = Request::builder()
            .method("POST")
            .uri("/channels?nonce=q")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"channel\":"))
            .unwrap();
        let (status, body) = send(app(AppState::default()), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "common.invalid_json_string");
        assert_eq!(body["nonce"], "q");
    }

    #[tokio::test]
    async fn method_mismatch_is_unsupported_envelope() {
        let (status, body) = send(app(AppState::default()), get_req("/channels?nonce=n")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "common.unsupported");
        assert_eq!(body["success"], false);
        assert_eq!(body["nonce"], "n");
    }

    #[tokio::test]
    async fn extractor_rejection_is_rendered_as_envelope() {
        let req = Request::builder()
            .method("POST")
            .uri("/typed?nonce=t")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = send(app(AppState::default()), req).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"]["type"], "common.rejected_request");
        assert_eq!(body["error"]["code"], 415);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Content-Type"));
        assert_eq!(body["success"], false);
        assert_eq!(body["nonce"], "t");
    }

    #[tokio::test]
    async fn typed_json_body_still_reaches_handler() {
        let req = Request::builder()
            .method("POST")
            .uri("/typed")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"a":1}"#))
            .unwrap();
        let (status, body) = send(app(AppState::default()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["echo"], json!({"a": 1}));
    }

    #[tokio::test]
    async fn timing_adds_elapsed_time() {
        let state = AppState {
            record_timing: true,
            ..AppState::default()
        };
        let (_, body) = send(app(state), get_req("/health")).await;
        assert!(body["elapsed_time"].as_f64().is_some());
    }

    #[tokio::test]
    async fn panic_renders_500_and_notifies() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_error()
            .withf(|alert| alert.message.contains("handler exploded"))
            .times(1)
            .return_const(());
        let state = AppState::new(ErrorCatalog::builtin(), Arc::new(notifier), false);

        let (status, body) = send(app(state), get_req("/boom?nonce=p")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["type"], "common.unexpected_error");
        assert_eq!(body["success"], false);
        assert_eq!(body["nonce"], "p");
    }
}
