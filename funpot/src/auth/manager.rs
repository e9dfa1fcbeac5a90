//! Login orchestration.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use super::{
    errors::{AuthError, AuthResult},
    gate::AuthGate,
    init_data::{VerifiedIdentity, verify_init_data},
    models::LoginResponse,
    session::SessionIssuer,
};
use crate::users::{ExternalProfile, UserService};

/// Default session token lifetime in seconds
pub const DEFAULT_JWT_TTL_SECS: i64 = 15 * 60;

/// Default accepted age of a launch payload in seconds
pub const DEFAULT_INIT_DATA_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Authentication settings
#[derive(Clone)]
pub struct AuthConfig {
    /// Bot token shared with the messaging platform
    pub bot_token: String,
    /// Session token signing secret
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    /// Zero disables the freshness check
    pub init_data_max_age: Duration,
}

impl AuthConfig {
    pub fn new(bot_token: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            jwt_secret: jwt_secret.into(),
            jwt_ttl: Duration::seconds(DEFAULT_JWT_TTL_SECS),
            init_data_max_age: Duration::seconds(DEFAULT_INIT_DATA_MAX_AGE_SECS),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("bot_token", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl", &self.jwt_ttl)
            .field("init_data_max_age", &self.init_data_max_age)
            .finish()
    }
}

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    bot_token: String,
    init_data_max_age: Duration,
    issuer: SessionIssuer,
    gate: AuthGate,
    users: UserService,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidConfiguration` - empty bot token or JWT secret,
    ///   or a TTL shorter than one second
    pub fn new(config: AuthConfig, users: UserService) -> AuthResult<Self> {
        if config.bot_token.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "bot token must be provided".to_string(),
            ));
        }

        let issuer = SessionIssuer::new(&config.jwt_secret, config.jwt_ttl)?;

        Ok(Self {
            bot_token: config.bot_token,
            init_data_max_age: config.init_data_max_age,
            gate: AuthGate::new(issuer.clone()),
            issuer,
            users,
        })
    }

    /// Log in with a raw launch payload
    ///
    /// Verifies the payload, creates or refreshes the user's profile and
    /// issues a session token for it.
    ///
    /// # Errors
    ///
    /// * Payload and trust errors from [`verify_init_data`]
    /// * `AuthError::User` - profile storage failed
    pub async fn authenticate(
        &self,
        init_data: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<LoginResponse> {
        let identity = self.verify(init_data, now)?;

        let user = self
            .users
            .sync_profile(&ExternalProfile::from(&identity))
            .await?;

        let issued = self
            .issuer
            .issue(&user.id, user.external_user_id, now)?;

        log::debug!("Issued session token for {}", user.id);

        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        })
    }

    /// Verify a launch payload without touching storage
    pub fn verify(&self, init_data: &str, now: DateTime<Utc>) -> AuthResult<VerifiedIdentity> {
        verify_init_data(init_data, &self.bot_token, self.init_data_max_age, now).inspect_err(
            |e| {
                if e.is_trust_error() {
                    log::warn!("Launch payload rejected: {}", e);
                }
            },
        )
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub fn issuer(&self) -> &SessionIssuer {
        &self.issuer
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }
}
