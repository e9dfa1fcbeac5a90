//! Authentication middleware for protected endpoints.
//!
//! The middleware validates the `Authorization: Bearer <token>` header with
//! the [`AuthGate`](funpot::AuthGate) and injects the resulting
//! [`AuthenticatedUser`] into request extensions for downstream handlers.
//!
//! # Extracting the caller
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use funpot::AuthenticatedUser;
//!
//! async fn protected_handler(Extension(user): Extension<AuthenticatedUser>) -> String {
//!     format!("Authenticated as {}", user.user_id())
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use funpot::{AuthError, AuthenticatedUser};

use super::{
    AppState,
    auth::{ApiError, auth_error},
};
use crate::metrics::token_rejections_total;

/// Authentication middleware that validates bearer tokens.
///
/// # Behavior
///
/// - **Success**: Injects `AuthenticatedUser` into request extensions → Calls next handler
/// - **Missing header**: Returns `401 Unauthorized`
/// - **Invalid format**: Returns `401 Unauthorized`
/// - **Invalid/expired token**: Returns `401 Unauthorized` with a generic message
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = match request.headers().get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| reject(AuthError::MalformedCredential))?),
        None => None,
    };

    let user: AuthenticatedUser = state
        .auth_manager
        .gate()
        .authenticate(header)
        .map_err(reject)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn reject(err: AuthError) -> ApiError {
    token_rejections_total();
    tracing::debug!("Unauthenticated request: {}", err);
    auth_error(&err)
}
