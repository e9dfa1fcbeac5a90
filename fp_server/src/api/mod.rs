//! HTTP API for the FunPot server.
//!
//! # Modules
//!
//! - [`auth`]: Launch payload login
//! - [`users`]: The caller's profile and client configuration
//! - [`middleware`]: Bearer authentication for protected endpoints
//! - [`request_id`]: Request correlation ids
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /healthz              - Liveness (public)
//! GET  /readyz               - Readiness, pings the profile store (public)
//! POST /api/auth/telegram    - Log in with a launch payload (public)
//! GET  /api/me               - Caller's profile (auth required)
//! GET  /api/config           - Feature flags (auth required)
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, configure appropriate
//! origins, methods, and headers.

pub mod auth;
pub mod middleware;
pub mod request_id;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use funpot::AuthManager;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub features: Arc<BTreeMap<String, bool>>,
}

impl AppState {
    pub fn new(auth_manager: AuthManager, features: BTreeMap<String, bool>) -> Self {
        Self {
            auth_manager: Arc::new(auth_manager),
            features: Arc::new(features),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProbeResponse {
    status: &'static str,
    time: String,
}

impl ProbeResponse {
    fn new(status: &'static str) -> Self {
        Self {
            status,
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use fp_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/healthz", get(health_check))
        .route("/readyz", get(readiness_check))
        .route("/api/auth/telegram", post(auth::telegram_login));

    let protected_routes = Router::new()
        .route("/api/me", get(users::me))
        .route("/api/config", get(users::client_config))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id::request_id_middleware))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Liveness probe.
async fn health_check() -> impl IntoResponse {
    Json(ProbeResponse::new("ok"))
}

/// Readiness probe.
///
/// Returns `503 Service Unavailable` while the profile store is unreachable.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.auth_manager.users().ping().await {
        Ok(()) => (StatusCode::OK, Json(ProbeResponse::new("ready"))),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ProbeResponse::new("not_ready")),
            )
        }
    }
}
