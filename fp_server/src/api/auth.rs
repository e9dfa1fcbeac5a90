//! Authentication API handlers.
//!
//! The web app posts the launch payload it received from the messaging
//! client and gets back a session token plus the synchronized profile.
//!
//! # Examples
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/auth/telegram \
//!   -H "Content-Type: application/json" \
//!   -d '{"initData": "query_id=...&user=...&auth_date=...&hash=..."}'
//! ```

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use funpot::auth::{AuthError, AuthErrorKind, LoginRequest, LoginResponse};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    logging::log_security_event,
    metrics::{LoginOutcome, login_attempts_total},
};

/// Error body shared by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Build an error response
pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

/// HTTP status for an authentication failure
pub fn status_for(err: &AuthError) -> StatusCode {
    match err.kind() {
        AuthErrorKind::Payload => StatusCode::BAD_REQUEST,
        AuthErrorKind::Trust | AuthErrorKind::Token => StatusCode::UNAUTHORIZED,
        AuthErrorKind::Internal | AuthErrorKind::Repository => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map an authentication failure to a client-safe response
pub fn auth_error(err: &AuthError) -> ApiError {
    api_error(status_for(err), err.client_message())
}

/// Log in with a launch payload.
///
/// # Request Body
///
/// ```json
/// { "initData": "query_id=...&user=%7B%22id%22%3A...%7D&auth_date=1700000000&hash=..." }
/// ```
///
/// # Response
///
/// On success, returns `200 OK`:
/// ```json
/// {
///   "token": "eyJhbGciOiJIUzI1NiIs...",
///   "expiresAt": "2025-11-22T10:45:00Z",
///   "user": { "id": "ext_123456789", "telegramId": 123456789, "...": "..." }
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unreadable body, missing `initData` or a defective payload
/// - `401 Unauthorized`: Hash mismatch or expired payload
/// - `500 Internal Server Error`: Profile storage failed
pub async fn telegram_login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!("Rejected login body: {}", e);
        login_attempts_total(LoginOutcome::Rejected);
        api_error(StatusCode::BAD_REQUEST, "invalid request body")
    })?;

    if request.init_data.is_empty() {
        login_attempts_total(LoginOutcome::Rejected);
        return Err(api_error(StatusCode::BAD_REQUEST, "initData is required"));
    }

    match state
        .auth_manager
        .authenticate(&request.init_data, Utc::now())
        .await
    {
        Ok(response) => {
            login_attempts_total(LoginOutcome::Success);
            tracing::info!(user_id = %response.user.id, "Login succeeded");
            Ok(Json(response))
        }
        Err(e) => {
            match e.kind() {
                AuthErrorKind::Payload => {
                    login_attempts_total(LoginOutcome::Rejected);
                    tracing::debug!("Login payload rejected: {}", e);
                }
                AuthErrorKind::Trust | AuthErrorKind::Token => {
                    login_attempts_total(LoginOutcome::Rejected);
                    log_security_event("init_data_rejected", None, &e.to_string());
                }
                AuthErrorKind::Internal | AuthErrorKind::Repository => {
                    login_attempts_total(LoginOutcome::Error);
                    tracing::error!("Failed to authenticate launch payload: {}", e);
                }
            }
            Err(auth_error(&e))
        }
    }
}
