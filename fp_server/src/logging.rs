//! Structured logging configuration.
//!
//! This module provides structured logging with request correlation and
//! security event tracking. Records emitted through the `log` facade by the
//! `funpot` library are forwarded into the same subscriber.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directives appended to the configured level
const QUIET_DEPENDENCIES: &str = "sqlx=warn,hyper=warn";

/// Build the filter used when `RUST_LOG` is not set
pub fn default_filter(level: &str) -> String {
    format!("{level},{QUIET_DEPENDENCIES}")
}

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence; otherwise `level` (e.g. from
/// `FUNPOT_LOG_LEVEL`) is used.
///
/// # Example
///
/// ```no_run
/// use fp_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init("info");
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(level)))
        .unwrap_or_else(|_| EnvFilter::new(default_filter("info")));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Example
///
/// ```
/// use fp_server::logging::log_security_event;
///
/// log_security_event("init_data_rejected", None, "Invalid init data hash");
/// ```
pub fn log_security_event(event_type: &str, user_id: Option<&str>, message: &str) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id,
        "SECURITY: {}",
        message
    );
}

/// Log API request/response
pub fn log_api_request(
    request_id: &str,
    method: &str,
    path: &str,
    status_code: u16,
    duration_ms: u64,
) {
    tracing::info!(
        request_id = request_id,
        http_method = method,
        http_path = path,
        http_status = status_code,
        duration_ms = duration_ms,
        "API request completed"
    );
}
