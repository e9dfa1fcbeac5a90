//! Bearer credential guard for protected requests.

use chrono::{DateTime, Utc};

use super::errors::{AuthError, AuthResult};
use super::session::{SessionClaims, SessionIssuer};
use crate::users::ExternalUserId;

const BEARER_SCHEME: &str = "bearer";

/// Identity of the caller of a protected request.
///
/// Only [`AuthGate`] hands these out, so holding one means the bearer token
/// was valid when the request arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    claims: SessionClaims,
}

impl AuthenticatedUser {
    pub(crate) fn new(claims: SessionClaims) -> Self {
        Self { claims }
    }

    /// Local profile id
    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    pub fn external_user_id(&self) -> ExternalUserId {
        self.claims.tid
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims.expires_at()
    }

    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }
}

/// Validates `Authorization: Bearer <token>` headers.
#[derive(Debug, Clone)]
pub struct AuthGate {
    issuer: SessionIssuer,
}

impl AuthGate {
    pub fn new(issuer: SessionIssuer) -> Self {
        Self { issuer }
    }

    /// Authenticate an `Authorization` header value against the wall clock.
    pub fn authenticate(&self, header: Option<&str>) -> AuthResult<AuthenticatedUser> {
        self.authenticate_at(header, Utc::now())
    }

    /// Authenticate an `Authorization` header value as of `now`.
    ///
    /// # Errors
    ///
    /// * `AuthError::MissingCredential` - no header, or an empty one
    /// * `AuthError::MalformedCredential` - not `Bearer <token>`
    /// * `AuthError::Unauthenticated` - the token was rejected
    pub fn authenticate_at(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> AuthResult<AuthenticatedUser> {
        let header = header
            .filter(|h| !h.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let token = bearer_token(header).ok_or(AuthError::MalformedCredential)?;

        match self.issuer.parse_at(token, now) {
            Ok(claims) => Ok(AuthenticatedUser::new(claims)),
            Err(e) => {
                log::debug!("Rejected session token: {}", e);
                Err(AuthError::Unauthenticated)
            }
        }
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next()?;
    let token = parts.next()?;

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME)
        || token.is_empty()
        || token.contains(char::is_whitespace)
    {
        return None;
    }
    Some(token)
}
