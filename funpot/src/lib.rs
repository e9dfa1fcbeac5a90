//! # FunPot
//!
//! Authentication core for a web app launched from inside a messaging
//! platform.
//!
//! The platform signs a "launch payload" (initData) with a key derived from
//! the bot token. This library verifies that payload, keeps a local user
//! profile in sync with the identity it carries and issues short-lived
//! bearer session tokens for the requests that follow.
//!
//! ## Core Modules
//!
//! - [`auth`]: payload verification, session tokens, bearer gate, login flow
//! - [`users`]: user profiles and the create-or-update synchronizer
//! - [`db`]: repository trait with Postgres and in-memory stores
//!
//! ## Example
//!
//! ```
//! use funpot::users::referral_code;
//!
//! let code = referral_code(123456789);
//! assert_eq!(code.len(), 10);
//! ```

/// Launch payload verification, session tokens and login orchestration.
pub mod auth;
pub use auth::{AuthConfig, AuthError, AuthGate, AuthManager, AuthenticatedUser, SessionIssuer};

/// Profile storage.
pub mod db;

/// User profiles and synchronization.
pub mod users;
pub use users::{UserError, UserProfile, UserService};
