//! Repository call timeout helpers
//!
//! Bounds every repository round-trip so a stalled store surfaces as an
//! error instead of hanging the request.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::users::{UserError, UserResult};

/// Default timeout for a single repository call (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for a full profile sync (read plus write, 10 seconds)
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// Execute a repository call with timeout
///
/// The wrapped future is dropped when the deadline passes, which cancels the
/// in-flight query.
///
/// # Example
///
/// ```no_run
/// use funpot::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use funpot::db::UserRepository;
/// # async fn example(repo: &dyn UserRepository) -> Result<(), Box<dyn std::error::Error>> {
///
/// let profile = with_timeout(DEFAULT_QUERY_TIMEOUT, repo.get_by_external_id(42)).await?;
/// # let _ = profile;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> UserResult<T>
where
    F: Future<Output = UserResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(UserError::Timeout(duration)),
    }
}

/// Execute a repository call with the default timeout (5 seconds)
pub async fn with_default_timeout<F, T>(future: F) -> UserResult<T>
where
    F: Future<Output = UserResult<T>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}
