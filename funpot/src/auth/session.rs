//! Session token issuance and validation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::errors::{AuthError, AuthResult};
use crate::users::ExternalUserId;

/// The only algorithm tokens are signed and accepted with
const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

/// Session token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Local profile id
    pub sub: String,
    /// Local profile id (same as `sub`)
    pub uid: String,
    /// External (platform) user id
    pub tid: ExternalUserId,
    /// Issued at, unix seconds
    pub iat: i64,
    /// Expires at, unix seconds
    pub exp: i64,
}

impl SessionClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// A freshly signed token and its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints and validates HS256 session tokens.
///
/// Cloning shares the key material.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    ttl: Duration,
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("algorithm", &SESSION_ALGORITHM)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    /// Create an issuer.
    ///
    /// `ttl` is truncated to whole seconds.
    ///
    /// # Errors
    ///
    /// `AuthError::InvalidConfiguration` if `secret` is empty or `ttl` is
    /// shorter than one second.
    pub fn new(secret: &str, ttl: Duration) -> AuthResult<Self> {
        if secret.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "JWT secret must be provided".to_string(),
            ));
        }

        let ttl = Duration::seconds(ttl.num_seconds());
        if ttl <= Duration::zero() {
            return Err(AuthError::InvalidConfiguration(
                "JWT TTL must be at least one second".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `subject_id`, valid from `now` for the configured TTL.
    pub fn issue(
        &self,
        subject_id: &str,
        external_user_id: ExternalUserId,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        let issued_at = now.timestamp();
        let expires_at = issued_at + self.ttl.num_seconds();
        let claims = SessionClaims {
            sub: subject_id.to_string(),
            uid: subject_id.to_string(),
            tid: external_user_id,
            iat: issued_at,
            exp: expires_at,
        };

        let token = encode(&Header::new(SESSION_ALGORITHM), &claims, &self.encoding_key)?;
        let expires_at = DateTime::from_timestamp(expires_at, 0).ok_or_else(|| {
            AuthError::InvalidConfiguration("token expiry out of range".to_string())
        })?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate `token` against the current time.
    pub fn parse(&self, token: &str) -> AuthResult<SessionClaims> {
        self.parse_at(token, Utc::now())
    }

    /// Validate `token` as of `now`.
    ///
    /// # Errors
    ///
    /// * `AuthError::MalformedToken` - not a decodable JWT with the expected claims
    /// * `AuthError::AlgorithmMismatch` - header names an algorithm other than HS256
    /// * `AuthError::InvalidSignature` - signature does not verify
    /// * `AuthError::TokenExpired` - `now` is at or past `exp`
    pub fn parse_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<SessionClaims> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        if header.alg != SESSION_ALGORITHM {
            return Err(AuthError::AlgorithmMismatch);
        }

        let mut validation = Validation::new(SESSION_ALGORITHM);
        // Expiry is checked below against the supplied clock, without leeway
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => AuthError::AlgorithmMismatch,
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::MalformedToken,
            })?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}
