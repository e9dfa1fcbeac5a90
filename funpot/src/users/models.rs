//! User profile data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to the user by the messaging platform
pub type ExternalUserId = i64;

/// Durable local user profile.
///
/// `id` and `referral_code` are derived from `external_user_id` when the row
/// is first created and are never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(rename = "telegramId")]
    pub external_user_id: ExternalUserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub language_code: String,
    pub referral_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The mutable subset of platform fields a sync copies onto a profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalProfile {
    pub id: ExternalUserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub language_code: String,
}

/// Outcome of an insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The row was written by this call
    Created,
    /// A row for the same external id already existed and was left untouched
    AlreadyExists,
}
