//! Configuration loading and validation for the gateway service.
//!
//! Service settings are read from environment variables at startup. The process
//! exits with a clear error message if any variable is present but invalid.
//! Auxiliary files (such as the error catalog) are opaque YAML mappings read
//! through [`load_mapping`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Deployment mode. Controls log format, request timing and the default notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    /// Human-readable logs, `elapsed_time` on every envelope, alerts to the log.
    Development,
    /// JSON logs, no timing, alerts to the webhook when one is configured.
    Production,
}

impl AppEnv {
    pub fn is_development(&self) -> bool {
        matches!(self, AppEnv::Development)
    }
}

/// Validated gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Deployment mode (`APP_ENV`).
    #[serde(default = "default_app_env")]
    pub app_env: AppEnv,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// YAML file whose descriptors are merged over the built-in error catalog.
    #[serde(default)]
    pub error_catalog_path: Option<String>,

    /// Endpoint that receives alert payloads as JSON `POST`s.
    #[serde(default)]
    pub notifier_webhook_url: Option<String>,

    /// Prefix attached to every alert, normally the host name.
    #[serde(default = "default_notifier_prefix")]
    pub notifier_prefix: String,

    /// Number of alerts the webhook queue holds before dropping new ones.
    #[serde(default = "default_notifier_queue_capacity")]
    pub notifier_queue_capacity: usize,

    /// OTLP endpoint for span export. Export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_app_env() -> AppEnv {
    AppEnv::Development
}
fn default_listen_port() -> u16 {
    3000
}
fn default_log_level() -> String {
    "info".into()
}
fn default_notifier_prefix() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into())
}
fn default_notifier_queue_capacity() -> usize {
    256
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.listen_port == 0 {
            anyhow::bail!("LISTEN_PORT must be > 0");
        }
        if self.notifier_queue_capacity == 0 {
            anyhow::bail!("NOTIFIER_QUEUE_CAPACITY must be > 0");
        }
        ensure_non_empty(&self.notifier_prefix, "NOTIFIER_PREFIX")?;
        if let Some(url) = &self.notifier_webhook_url {
            ensure_non_empty(url, "NOTIFIER_WEBHOOK_URL")?;
            url.parse::<hyper::Uri>()
                .with_context(|| format!("NOTIFIER_WEBHOOK_URL is not a valid URI: {url}"))?;
        }
        if let Some(path) = &self.error_catalog_path {
            ensure_non_empty(path, "ERROR_CATALOG_PATH")?;
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }
        Ok(())
    }
}

impl Default for Config {
    /// Development defaults, suitable for tests.
    fn default() -> Self {
        Self {
            app_env: default_app_env(),
            listen_port: default_listen_port(),
            log_level: default_log_level(),
            error_catalog_path: None,
            notifier_webhook_url: None,
            notifier_prefix: default_notifier_prefix(),
            notifier_queue_capacity: default_notifier_queue_capacity(),
            otel_exporter_otlp_endpoint: None,
        }
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty when set");
    }
    Ok(())
}

/// Load a YAML file as an arbitrary nested mapping.
///
/// The content is not interpreted here; callers decide what shape they expect.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid YAML.
pub fn load_mapping(path: impl AsRef<Path>) -> Result<serde_json::Value> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("{} is not valid YAML", path.display()))
}
