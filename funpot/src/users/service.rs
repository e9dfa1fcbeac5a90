//! Profile synchronization.
//!
//! Maps a verified platform identity onto a durable local profile, creating
//! it on first touch and refreshing the mutable fields afterwards.

use chrono::{DateTime, SubsecRound, Utc};
use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{
    errors::{UserError, UserResult},
    models::{CreateOutcome, ExternalProfile, ExternalUserId, UserProfile},
};
use crate::db::{
    UserRepository,
    timeouts::{DEFAULT_SYNC_TIMEOUT, with_timeout},
};

/// Namespace mixed into referral code hashing
pub const REFERRAL_NAMESPACE: &str = "funpot";

/// Length of every referral code
pub const REFERRAL_CODE_LEN: usize = 10;

/// Prefix of locally assigned profile ids
pub const PROFILE_ID_PREFIX: &str = "ext_";

/// Source of "now" for profile timestamps
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Local profile id for an external user id.
pub fn profile_id(external_id: ExternalUserId) -> String {
    format!("{PROFILE_ID_PREFIX}{external_id}")
}

/// Deterministic referral code for an external user id.
///
/// SHA-256 over `"funpot:<id>"`, RFC 4648 base32 (uppercase, unpadded),
/// first ten characters.
pub fn referral_code(external_id: ExternalUserId) -> String {
    let digest = Sha256::digest(format!("{REFERRAL_NAMESPACE}:{external_id}").as_bytes());
    let mut encoded = BASE32_NOPAD.encode(&digest);
    encoded.truncate(REFERRAL_CODE_LEN);
    encoded
}

/// Create-or-update of user profiles over an injected repository.
///
/// Holds no cache and no locks. Concurrent first syncs for the same external
/// id are made safe by the repository's insert-if-absent.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    clock: Clock,
    sync_timeout: Duration,
}

impl fmt::Debug for UserService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserService")
            .field("sync_timeout", &self.sync_timeout)
            .finish_non_exhaustive()
    }
}

impl UserService {
    /// Create a service backed by the provided repository
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self {
            repo,
            clock: Arc::new(Utc::now),
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }

    /// Override the clock used for `created_at`/`updated_at`
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Override the deadline applied to `sync_profile`
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// Ensure a profile exists for `external` and reflects its current fields.
    ///
    /// # Errors
    ///
    /// * `UserError::Timeout` - the repository did not answer within the sync deadline
    /// * `UserError::Database` / `UserError::Unavailable` - storage failure
    /// * `UserError::NotFound` - the row vanished between read and update
    pub async fn sync_profile(&self, external: &ExternalProfile) -> UserResult<UserProfile> {
        self.sync_profile_within(external, self.sync_timeout).await
    }

    /// `sync_profile` with a caller-supplied deadline.
    ///
    /// When the deadline passes the pending repository call is dropped and
    /// `UserError::Timeout` is returned.
    pub async fn sync_profile_within(
        &self,
        external: &ExternalProfile,
        deadline: Duration,
    ) -> UserResult<UserProfile> {
        with_timeout(deadline, self.sync(external)).await
    }

    /// Read-only lookup by external id
    pub async fn get_by_external_id(&self, external_id: ExternalUserId) -> UserResult<UserProfile> {
        with_timeout(self.sync_timeout, self.repo.get_by_external_id(external_id)).await
    }

    /// Probe the backing repository
    pub async fn ping(&self) -> UserResult<()> {
        with_timeout(self.sync_timeout, self.repo.ping()).await
    }

    async fn sync(&self, external: &ExternalProfile) -> UserResult<UserProfile> {
        match self.repo.get_by_external_id(external.id).await {
            Ok(existing) => self.refresh(existing, external).await,
            Err(UserError::NotFound) => self.create(external).await,
            Err(e) => Err(e),
        }
    }

    async fn create(&self, external: &ExternalProfile) -> UserResult<UserProfile> {
        let profile = self.new_profile(external);

        match self.repo.create(&profile).await? {
            CreateOutcome::Created => {
                log::info!("Created profile {} for external user {}", profile.id, external.id);
                Ok(profile)
            }
            CreateOutcome::AlreadyExists => {
                // Lost a first-touch race; the winner's row is authoritative
                log::debug!("Profile for external user {} created concurrently", external.id);
                self.repo.get_by_external_id(external.id).await
            }
        }
    }

    async fn refresh(
        &self,
        existing: UserProfile,
        external: &ExternalProfile,
    ) -> UserResult<UserProfile> {
        let updated = UserProfile {
            username: external.username.clone(),
            first_name: external.first_name.clone(),
            last_name: external.last_name.clone(),
            language_code: external.language_code.clone(),
            updated_at: self.now(),
            ..existing
        };

        self.repo.update(&updated).await?;
        Ok(updated)
    }

    fn new_profile(&self, external: &ExternalProfile) -> UserProfile {
        let now = self.now();
        UserProfile {
            id: profile_id(external.id),
            external_user_id: external.id,
            username: external.username.clone(),
            first_name: external.first_name.clone(),
            last_name: external.last_name.clone(),
            language_code: external.language_code.clone(),
            referral_code: referral_code(external.id),
            created_at: now,
            updated_at: now,
        }
    }

    // Microseconds: what TIMESTAMPTZ keeps, so returned and re-read profiles agree
    fn now(&self) -> DateTime<Utc> {
        (self.clock)().trunc_subsecs(6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryUserRepository;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn external(id: i64, username: &str) -> ExternalProfile {
        ExternalProfile {
            id,
            username: username.to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            language_code: "en".to_string(),
        }
    }

    /// Clock that advances one minute per reading
    fn ticking_clock() -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
        let ticks = Mutex::new(0i64);
        move || {
            let mut ticks = ticks.lock().unwrap();
            *ticks += 1;
            Utc.timestamp_opt(1_700_000_000 + *ticks * 60, 0).unwrap()
        }
    }

    #[test]
    fn test_profile_id_format() {
        assert_eq!(profile_id(123456789), "ext_123456789");
        assert_eq!(profile_id(-5), "ext_-5");
    }

    #[test]
    fn test_referral_code_is_stable() {
        let code = referral_code(123456789);
        assert_eq!(code.len(), REFERRAL_CODE_LEN);
        assert_eq!(code, referral_code(123456789));
        assert!(
            code.chars()
                .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c))
        );
    }

    #[test]
    fn test_referral_code_matches_manual_encoding() {
        let digest = Sha256::digest(b"funpot:1");
        let expected = &BASE32_NOPAD.encode(&digest)[..REFERRAL_CODE_LEN];
        assert_eq!(referral_code(1), expected);
    }

    #[test]
    fn test_referral_codes_unique_over_sequential_ids() {
        let codes: HashSet<String> = (1..=10_000).map(referral_code).collect();
        assert_eq!(codes.len(), 10_000);
    }

    #[tokio::test]
    async fn test_first_sync_creates_profile() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let service = UserService::new(repo.clone()).with_clock(ticking_clock());

        let profile = service.sync_profile(&external(42, "alice")).await.unwrap();

        assert_eq!(profile.id, "ext_42");
        assert_eq!(profile.external_user_id, 42);
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.referral_code, referral_code(42));
        assert_eq!(profile.created_at, profile.updated_at);
        assert_eq!(repo.get_by_external_id(42).await.unwrap(), profile);
    }

    #[tokio::test]
    async fn test_second_sync_updates_mutable_fields_only() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let service = UserService::new(repo.clone()).with_clock(ticking_clock());

        let first = service.sync_profile(&external(42, "alice")).await.unwrap();
        let mut renamed = external(42, "alice_w");
        renamed.language_code = "de".to_string();
        let second = service.sync_profile(&renamed).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.referral_code, first.referral_code);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.username, "alice_w");
        assert_eq!(second.language_code, "de");

        assert_eq!(repo.len().await, 1);
        assert_eq!(repo.get_by_external_id(42).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_concurrent_first_syncs_converge() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let service = UserService::new(repo.clone());

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.sync_profile(&external(7, &format!("u{i}"))).await
            }));
        }

        for handle in handles {
            let profile = handle.await.unwrap().unwrap();
            assert_eq!(profile.id, "ext_7");
            assert_eq!(profile.referral_code, referral_code(7));
        }
        assert_eq!(repo.len().await, 1);
    }

    /// Repository that reports a conflict on create, as a concurrent winner would
    struct RacingRepository {
        winner: UserProfile,
        lookups: Mutex<u32>,
    }

    #[async_trait]
    impl UserRepository for RacingRepository {
        async fn get_by_external_id(&self, _id: ExternalUserId) -> UserResult<UserProfile> {
            let mut lookups = self.lookups.lock().unwrap();
            *lookups += 1;
            if *lookups == 1 {
                Err(UserError::NotFound)
            } else {
                Ok(self.winner.clone())
            }
        }

        async fn create(&self, _profile: &UserProfile) -> UserResult<CreateOutcome> {
            Ok(CreateOutcome::AlreadyExists)
        }

        async fn update(&self, _profile: &UserProfile) -> UserResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lost_create_race_returns_stored_row() {
        let winner = UserProfile {
            id: profile_id(9),
            external_user_id: 9,
            username: "winner".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            language_code: String::new(),
            referral_code: referral_code(9),
            created_at: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
            updated_at: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
        };
        let repo = Arc::new(RacingRepository {
            winner: winner.clone(),
            lookups: Mutex::new(0),
        });

        let profile = UserService::new(repo)
            .sync_profile(&external(9, "loser"))
            .await
            .unwrap();
        assert_eq!(profile, winner);
    }

    /// Repository whose every call fails or stalls
    struct BrokenRepository {
        stall: bool,
    }

    #[async_trait]
    impl UserRepository for BrokenRepository {
        async fn get_by_external_id(&self, _id: ExternalUserId) -> UserResult<UserProfile> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Err(UserError::Unavailable("connection refused".to_string()))
        }

        async fn create(&self, _profile: &UserProfile) -> UserResult<CreateOutcome> {
            Err(UserError::Unavailable("connection refused".to_string()))
        }

        async fn update(&self, _profile: &UserProfile) -> UserResult<()> {
            Err(UserError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_repository_errors_propagate() {
        let service = UserService::new(Arc::new(BrokenRepository { stall: false }));
        let err = service.sync_profile(&external(1, "x")).await.unwrap_err();
        assert!(matches!(err, UserError::Unavailable(_)));
        assert!(err.is_unavailable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_repository_hits_deadline() {
        let service = UserService::new(Arc::new(BrokenRepository { stall: true }));
        let err = service
            .sync_profile_within(&external(1, "x"), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Timeout(_)));
    }

    /// Repository where the row disappears between read and write
    struct VanishingRepository;

    #[async_trait]
    impl UserRepository for VanishingRepository {
        async fn get_by_external_id(&self, id: ExternalUserId) -> UserResult<UserProfile> {
            let now = Utc::now();
            Ok(UserProfile {
                id: profile_id(id),
                external_user_id: id,
                username: String::new(),
                first_name: String::new(),
                last_name: String::new(),
                language_code: String::new(),
                referral_code: referral_code(id),
                created_at: now,
                updated_at: now,
            })
        }

        async fn create(&self, _profile: &UserProfile) -> UserResult<CreateOutcome> {
            Ok(CreateOutcome::Created)
        }

        async fn update(&self, _profile: &UserProfile) -> UserResult<()> {
            Err(UserError::NotFound)
        }
    }

    #[tokio::test]
    async fn test_update_of_vanished_row_is_not_found() {
        let service = UserService::new(Arc::new(VanishingRepository));
        let err = service.sync_profile(&external(3, "x")).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound));
    }
}
