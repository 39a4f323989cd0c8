//! `gateway` service binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the tracing pipeline.
//! 3. Load the error catalog.
//! 4. Select the notifier backend for the deployment mode.
//! 5. Build the Axum router and start the HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use gateway::{
    catalog::ErrorCatalog,
    config::{AppEnv, Config},
    notifier::{LogNotifier, Notifier, WebhookNotifier},
    server::{self, state::AppState},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(
        cfg.otel_exporter_otlp_endpoint.as_deref(),
        &cfg.log_level,
        !cfg.app_env.is_development(),
    )?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        env = ?cfg.app_env,
        "gateway starting"
    );

    // -----------------------------------------------------------------------
    // 3. Error catalog
    // -----------------------------------------------------------------------
    let catalog = match &cfg.error_catalog_path {
        Some(path) => ErrorCatalog::load(path)?,
        None => ErrorCatalog::builtin(),
    };

    // -----------------------------------------------------------------------
    // 4. Notifier
    // -----------------------------------------------------------------------
    let notifier: Arc<dyn Notifier> = match (&cfg.notifier_webhook_url, cfg.app_env) {
        (Some(url), AppEnv::Production) => {
            let url = url.parse().context("invalid NOTIFIER_WEBHOOK_URL")?;
            let (webhook, _alert_worker) =
                WebhookNotifier::spawn(url, cfg.notifier_prefix.clone(), cfg.notifier_queue_capacity);
            info!("alerts delivered to webhook");
            Arc::new(webhook)
        }
        _ => Arc::new(LogNotifier::new(cfg.notifier_prefix.clone())),
    };

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(catalog, notifier, cfg.app_env.is_development());
    let router = server::router::build(state, Router::new());

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
