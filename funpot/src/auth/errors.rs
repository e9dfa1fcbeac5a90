//! Authentication error types.

use thiserror::Error;

use crate::users::UserError;

/// Coarse class of an [`AuthError`], used to pick a transport status and a
/// log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Client sent a structurally defective launch payload
    Payload,
    /// Launch payload failed signature, freshness or secret checks
    Trust,
    /// Bearer credential missing, malformed or rejected
    Token,
    /// Server-side misconfiguration or signing failure
    Internal,
    /// Profile storage failed
    Repository,
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Launch payload is not a valid URL-encoded query string
    #[error("Malformed init data: {0}")]
    MalformedPayload(String),

    /// Launch payload has no `hash` field
    #[error("Init data missing hash")]
    MissingHash,

    /// Launch payload has no `auth_date` field
    #[error("Init data missing auth_date")]
    MissingAuthDate,

    /// `auth_date` is not base-10 unix seconds
    #[error("Init data auth_date is not a unix timestamp")]
    MalformedAuthDate,

    /// Launch payload has no `user` field
    #[error("Init data missing user")]
    MissingUser,

    /// `user` is not a JSON object with an integer `id`
    #[error("Init data user is malformed: {0}")]
    MalformedUser(String),

    /// Verification secret (bot token) is empty
    #[error("Init data verification secret is not configured")]
    MissingSecret,

    /// Payload signature does not match
    #[error("Invalid init data hash")]
    SignatureMismatch,

    /// Payload is older than the accepted window
    #[error("Init data expired")]
    Expired,

    /// Session token is not a structurally valid JWT
    #[error("Malformed session token")]
    MalformedToken,

    /// Session token is signed with an algorithm other than the pinned one
    #[error("Unexpected session token algorithm")]
    AlgorithmMismatch,

    /// Session token signature does not verify
    #[error("Invalid session token signature")]
    InvalidSignature,

    /// Session token is past its expiry
    #[error("Session token expired")]
    TokenExpired,

    /// No `Authorization` header was sent
    #[error("Missing authorization header")]
    MissingCredential,

    /// `Authorization` header is not `Bearer <token>`
    #[error("Invalid authorization header")]
    MalformedCredential,

    /// Bearer token was rejected; the reason is only logged
    #[error("Invalid token")]
    Unauthenticated,

    /// Issuer or manager constructed with unusable settings
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(String),

    /// JWT signing failed
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    /// Profile synchronization failed
    #[error("User error: {0}")]
    User(#[from] UserError),
}

impl AuthError {
    /// Classify the error
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::MalformedPayload(_)
            | AuthError::MissingHash
            | AuthError::MissingAuthDate
            | AuthError::MalformedAuthDate
            | AuthError::MissingUser
            | AuthError::MalformedUser(_) => AuthErrorKind::Payload,
            AuthError::MissingSecret | AuthError::SignatureMismatch | AuthError::Expired => {
                AuthErrorKind::Trust
            }
            AuthError::MalformedToken
            | AuthError::AlgorithmMismatch
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::MissingCredential
            | AuthError::MalformedCredential
            | AuthError::Unauthenticated => AuthErrorKind::Token,
            AuthError::InvalidConfiguration(_) | AuthError::JwtError(_) => AuthErrorKind::Internal,
            AuthError::User(_) => AuthErrorKind::Repository,
        }
    }

    /// Whether the client sent a defective launch payload
    pub fn is_payload_error(&self) -> bool {
        self.kind() == AuthErrorKind::Payload
    }

    /// Whether the payload failed a trust check (possible tampering)
    pub fn is_trust_error(&self) -> bool {
        self.kind() == AuthErrorKind::Trust
    }

    /// Whether a bearer credential was rejected
    pub fn is_token_error(&self) -> bool {
        self.kind() == AuthErrorKind::Token
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Token failures collapse to one message, storage and signing details
    /// are hidden.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::MalformedToken
            | AuthError::AlgorithmMismatch
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::Unauthenticated => AuthError::Unauthenticated.to_string(),
            AuthError::MalformedPayload(_) => "Malformed init data".to_string(),
            AuthError::MalformedUser(_) => "Init data user is malformed".to_string(),
            AuthError::User(e) => e.client_message(),
            AuthError::InvalidConfiguration(_) | AuthError::JwtError(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
