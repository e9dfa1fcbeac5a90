//! Prometheus metrics for monitoring server health and authentication.
//!
//! Metrics are exposed in Prometheus text format on a dedicated listener.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts, duration, status codes
//! - **Auth Metrics**: Login attempts by outcome, rejected bearer tokens
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use fp_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/auth/telegram", 200);
//! metrics::login_attempts_total(metrics::LoginOutcome::Success);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// How a login attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    /// Payload defect or failed trust check
    Rejected,
    /// Server-side failure
    Error,
}

impl LoginOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginOutcome::Success => "success",
            LoginOutcome::Rejected => "rejected",
            LoginOutcome::Error => "error",
        }
    }
}

/// Increment login attempts counter.
pub fn login_attempts_total(outcome: LoginOutcome) {
    metrics::counter!("auth_login_attempts_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Increment rejected bearer token counter.
pub fn token_rejections_total() {
    metrics::counter!("auth_token_rejections_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(LoginOutcome::Success.as_str(), "success");
        assert_eq!(LoginOutcome::Rejected.as_str(), "rejected");
        assert_eq!(LoginOutcome::Error.as_str(), "error");
    }

    #[test]
    fn test_recording_without_exporter() {
        // No recorder installed: calls are no-ops
        http_requests_total("GET", "/healthz", 200);
        http_request_duration_ms("GET", "/healthz", 1.5);
        login_attempts_total(LoginOutcome::Rejected);
        token_rejections_total();
    }
}
