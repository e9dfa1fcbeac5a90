//! Handlers for the authenticated caller's own data.

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
};
use funpot::{AuthenticatedUser, UserError, UserProfile};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{
    AppState,
    auth::{ApiError, api_error},
    request_id::RequestId,
};

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub features: BTreeMap<String, bool>,
}

/// Return the caller's stored profile.
///
/// # Errors
///
/// - `404 Not Found`: The profile no longer exists
/// - `500 Internal Server Error`: Profile storage failed
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    request_id: RequestId,
) -> Result<Json<UserProfile>, ApiError> {
    match state
        .auth_manager
        .users()
        .get_by_external_id(user.external_user_id())
        .await
    {
        Ok(profile) => Ok(Json(profile)),
        Err(UserError::NotFound) => Err(api_error(StatusCode::NOT_FOUND, "user not found")),
        Err(e) => {
            tracing::error!(
                request_id = %request_id.as_str(),
                user_id = %user.user_id(),
                "Failed to load profile: {}",
                e
            );
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to load profile",
            ))
        }
    }
}

/// Return the feature flags enabled for this deployment.
pub async fn client_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        features: state.features.as_ref().clone(),
    })
}
