//! Authentication: launch payload verification, session tokens and the
//! bearer guard for protected requests.
//!
//! This module implements:
//! - HMAC-SHA256 verification of the platform's signed launch payload
//! - Freshness checks on the payload's `auth_date`
//! - HS256 JWT session tokens (15-minute expiry by default)
//! - A bearer-header gate that yields an [`AuthenticatedUser`]
//!
//! ## Example
//!
//! ```no_run
//! use funpot::auth::{AuthConfig, AuthManager};
//! use funpot::db::InMemoryUserRepository;
//! use funpot::users::UserService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = UserService::new(Arc::new(InMemoryUserRepository::new()));
//!     let auth = AuthManager::new(
//!         AuthConfig::new("12345:ABCDEF", "a_long_random_jwt_signing_secret"),
//!         users,
//!     )?;
//!
//!     let init_data = "auth_date=1700000000&user=%7B%22id%22%3A1%7D&hash=...";
//!     let login = auth.authenticate(init_data, chrono::Utc::now()).await?;
//!
//!     let header = format!("Bearer {}", login.token);
//!     let caller = auth.gate().authenticate(Some(&header))?;
//!     println!("Authenticated {}", caller.user_id());
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod gate;
pub mod init_data;
pub mod manager;
pub mod models;
pub mod session;

pub use errors::{AuthError, AuthErrorKind, AuthResult};
pub use gate::{AuthGate, AuthenticatedUser};
pub use init_data::{VerifiedIdentity, encode_signed_init_data, sign_init_data, verify_init_data};
pub use manager::{AuthConfig, AuthManager, DEFAULT_INIT_DATA_MAX_AGE_SECS, DEFAULT_JWT_TTL_SECS};
pub use models::{LoginRequest, LoginResponse};
pub use session::{IssuedToken, SessionClaims, SessionIssuer};
