//! Authentication request and response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::users::UserProfile;

/// Login request carrying the raw launch payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub init_data: String,
}

/// Successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}
