//! Shared application state injected into every Axum handler and middleware.

use std::sync::Arc;

use crate::catalog::ErrorCatalog;
use crate::notifier::{LogNotifier, Notifier};
use crate::pipeline::ErrorResolver;

/// Application state shared across all requests.
///
/// All fields are cheaply cloneable so that Axum can clone the state for each
/// request without copying the catalog.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Renders failures; owns the error catalog and the notifier.
    pub resolver: ErrorResolver,
    /// Record a start time for every request so envelopes carry `elapsed_time`.
    pub record_timing: bool,
}

impl AppState {
    /// Create a new [`AppState`].
    pub fn new(catalog: ErrorCatalog, notifier: Arc<dyn Notifier>, record_timing: bool) -> Self {
        Self {
            resolver: ErrorResolver::new(catalog, notifier),
            record_timing,
        }
    }
}

impl Default for AppState {
    /// Built-in catalog, log notifier, no timing. Suitable for tests.
    fn default() -> Self {
        Self::new(
            ErrorCatalog::builtin(),
            Arc::new(LogNotifier::new("test")),
            false,
        )
    }
}
