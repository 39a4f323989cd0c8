//! Out-of-band alerting for unexpected faults.
//!
//! The request pipeline hands alerts to a [`Notifier`] and moves on. Backends
//! must return immediately; anything slow (network delivery) happens on a
//! background task owned by the backend.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header::CONTENT_TYPE, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

/// A fault report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// Error identifier the client saw, e.g. `"common.unexpected_error"`.
    pub kind: String,
    /// Top-level description of the fault.
    pub message: String,
    /// Underlying causes, outermost first.
    pub chain: Vec<String>,
}

impl Alert {
    /// Build an alert from an error and its source chain.
    pub fn from_error(kind: impl Into<String>, err: &anyhow::Error) -> Self {
        let mut causes = err.chain().map(ToString::to_string);
        let message = causes.next().unwrap_or_default();
        Self {
            kind: kind.into(),
            message,
            chain: causes.collect(),
        }
    }
}

/// Fire-and-forget alert sink shared by all in-flight requests.
///
/// Implementations must not block and must not panic; delivery failures are
/// the backend's own business.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync + 'static {
    fn error(&self, alert: Alert);
}

// ---------------------------------------------------------------------------
// Log backend
// ---------------------------------------------------------------------------

/// Writes alerts to the tracing pipeline.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    prefix: String,
}

impl LogNotifier {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn error(&self, alert: Alert) {
        error!(
            prefix = %self.prefix,
            kind = %alert.kind,
            chain = ?alert.chain,
            "{}",
            alert.message
        );
    }
}

// ---------------------------------------------------------------------------
// Webhook backend
// ---------------------------------------------------------------------------

/// JSON body posted to the webhook.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    prefix: &'a str,
    #[serde(flatten)]
    alert: &'a Alert,
}

/// Posts alerts as JSON to an HTTP endpoint.
///
/// Alerts go through a bounded queue drained by a single worker task, so
/// concurrent callers never contend on the connection. When the queue is full
/// new alerts are dropped with a warning.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    tx: mpsc::Sender<Alert>,
}

impl WebhookNotifier {
    /// Start the delivery worker and return a handle to feed it.
    ///
    /// Must be called from within a Tokio runtime. The worker exits once every
    /// handle has been dropped and the queue is drained.
    pub fn spawn(
        url: Uri,
        prefix: impl Into<String>,
        capacity: usize,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let worker = tokio::spawn(deliver(url, prefix.into(), rx));
        (Self { tx }, worker)
    }
}

impl Notifier for WebhookNotifier {
    fn error(&self, alert: Alert) {
        match self.tx.try_send(alert) {
            Ok(()) => {}
            Err(TrySendError::Full(alert)) => {
                warn!(kind = %alert.kind, "alert queue full; dropping alert");
            }
            Err(TrySendError::Closed(alert)) => {
                warn!(kind = %alert.kind, "alert worker stopped; dropping alert");
            }
        }
    }
}

async fn deliver(url: Uri, prefix: String, mut rx: mpsc::Receiver<Alert>) {
    let client: Client<HttpConnector, Full<Bytes>> =
        Client::builder(TokioExecutor::new()).build_http();

    while let Some(alert) = rx.recv().await {
        let body = match serde_json::to_vec(&WebhookPayload {
            prefix: &prefix,
            alert: &alert,
        }) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to serialise alert");
                continue;
            }
        };

        let req = match hyper::Request::post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "failed to build alert request");
                continue;
            }
        };

        match client.request(req).await {
            Ok(resp) if resp.status().is_success() => {
                debug!(kind = %alert.kind, "alert delivered");
            }
            Ok(resp) => {
                warn!(kind = %alert.kind, status = %resp.status(), "alert webhook rejected alert");
            }
            Err(e) => {
                warn!(kind = %alert.kind, error = %e, "alert delivery failed");
            }
        }
    }
    debug!("alert worker stopped");
}
