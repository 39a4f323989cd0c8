//! Uniform response envelope.
//!
//! Every body the service emits is the payload's fields followed by
//! `elapsed_time` (when timing is on), `success` and `nonce`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

use super::context::ResponseMeta;

/// Attach envelope fields to `payload`.
///
/// Object payloads are extended in place; any other value is wrapped under
/// `result` so the envelope is always an object.
pub fn build(payload: Value, meta: &ResponseMeta, success: bool) -> Map<String, Value> {
    let mut body = match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("result".into(), other);
            map
        }
    };

    if let Some(started_at) = meta.started_at {
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        body.insert("elapsed_time".into(), Value::from(elapsed_ms));
    }
    body.insert("success".into(), Value::Bool(success));
    body.insert("nonce".into(), meta.nonce.clone());
    body
}

/// Build the envelope and render it with `status`.
pub fn respond(status: StatusCode, payload: Value, meta: &ResponseMeta, success: bool) -> Response {
    (status, Json(Value::Object(build(payload, meta, success)))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{Duration, Instant};

    #[test]
    fn success_envelope_echoes_nonce() {
        let meta = ResponseMeta::new(json!("abc"), None);
        let body = build(json!({"channel": {"ch_no": "2"}}), &meta, true);
        assert_eq!(
            Value::Object(body.clone()),
            json!({"channel": {"ch_no": "2"}, "success": true, "nonce": "abc"})
        );
        let keys: Vec<_> = body.keys().map(String::as_str).collect();
        assert_eq!(keys, ["channel", "success", "nonce"]);
    }

    #[test]
    fn nonce_is_null_when_absent() {
        let body = build(json!({}), &ResponseMeta::default(), false);
        assert_eq!(body["nonce"], Value::Null);
        assert_eq!(body["success"], false);
    }

    #[test]
    fn elapsed_time_only_when_started() {
        let body = build(json!({}), &ResponseMeta::default(), true);
        assert!(!body.contains_key("elapsed_time"));

        let started = Instant::now() - Duration::from_millis(5);
        let body = build(json!({}), &ResponseMeta::new(Value::Null, Some(started)), true);
        let ms = body["elapsed_time"].as_f64().unwrap();
        assert!(ms >= 5.0, "expected at least 5ms, got {ms}");
    }

    #[test]
    fn scalar_payload_is_wrapped() {
        let body = build(json!(42), &ResponseMeta::default(), true);
        assert_eq!(body["result"], 42);
    }

    #[test]
    fn payload_cannot_spoof_success() {
        let body = build(json!({"success": true}), &ResponseMeta::default(), false);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn respond_sets_status_and_json() {
        let resp = respond(
            StatusCode::CREATED,
            json!({"id": 1}),
            &ResponseMeta::default(),
            true,
        );
        assert_eq!(resp.status(), StatusCode::CREATED);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["id"], 1);
        assert_eq!(v["success"], true);
    }
}
