//! User profiles: data model, errors and the synchronization service.
//!
//! ## Example
//!
//! ```no_run
//! use funpot::db::InMemoryUserRepository;
//! use funpot::users::{ExternalProfile, UserService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = UserService::new(Arc::new(InMemoryUserRepository::new()));
//!
//!     let profile = users
//!         .sync_profile(&ExternalProfile {
//!             id: 123456789,
//!             username: "alice".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("{} has referral code {}", profile.id, profile.referral_code);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod models;
pub mod service;

pub use errors::{UserError, UserResult};
pub use models::{CreateOutcome, ExternalProfile, ExternalUserId, UserProfile};
pub use service::{REFERRAL_CODE_LEN, UserService, profile_id, referral_code};
