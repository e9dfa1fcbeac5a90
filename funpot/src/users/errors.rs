//! User profile error types.

use std::time::Duration;
use thiserror::Error;

/// User profile and repository errors
#[derive(Debug, Error)]
pub enum UserError {
    /// No profile stored for the requested external id
    #[error("User not found")]
    NotFound,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository call exceeded its deadline and was abandoned
    #[error("Repository call timed out after {0:?}")]
    Timeout(Duration),

    /// Repository could not serve the request for another reason
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

impl UserError {
    /// Whether this error belongs to the "repository unavailable" class.
    ///
    /// `NotFound` is the only variant that is not; it is a lookup outcome
    /// rather than a storage failure.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, UserError::NotFound)
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            UserError::NotFound => self.to_string(),
            // Storage details never leave the server
            _ => "Internal server error".to_string(),
        }
    }
}

/// Result type for user operations
pub type UserResult<T> = Result<T, UserError>;
