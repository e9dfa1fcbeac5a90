//! Repository trait definitions for testability and dependency injection.
//!
//! The profile service talks to storage only through [`UserRepository`]. The
//! process picks one implementation at startup: [`PgUserRepository`] for
//! PostgreSQL or [`InMemoryUserRepository`](super::InMemoryUserRepository)
//! for development and tests.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::timeouts::with_default_timeout;
use crate::users::{CreateOutcome, ExternalUserId, UserError, UserProfile, UserResult};

/// Trait for user profile repository operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch the profile for an external id, `UserError::NotFound` if absent
    async fn get_by_external_id(&self, external_id: ExternalUserId) -> UserResult<UserProfile>;

    /// Insert the profile unless one already exists for the same external id.
    ///
    /// Must be atomic with respect to concurrent calls: at most one of them
    /// observes `CreateOutcome::Created`.
    async fn create(&self, profile: &UserProfile) -> UserResult<CreateOutcome>;

    /// Overwrite the mutable fields of an existing profile.
    ///
    /// Fails with `UserError::NotFound` if the row disappeared.
    async fn update(&self, profile: &UserProfile) -> UserResult<()>;

    /// Cheap liveness probe used by readiness checks
    async fn ping(&self) -> UserResult<()> {
        Ok(())
    }
}

const SELECT_BY_EXTERNAL_ID: &str = "SELECT id, telegram_id, username, first_name, last_name, language_code, \
     referral_code, created_at, updated_at FROM users WHERE telegram_id = $1";

const INSERT_IF_ABSENT: &str = r#"
INSERT INTO users (id, telegram_id, username, first_name, last_name, language_code, referral_code, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
ON CONFLICT (telegram_id) DO NOTHING
"#;

const UPDATE_PROFILE: &str = r#"
UPDATE users
SET username = $1,
    first_name = $2,
    last_name = $3,
    language_code = $4,
    updated_at = $5
WHERE telegram_id = $6
"#;

/// PostgreSQL implementation of `UserRepository`
///
/// Relies on the `telegram_id` uniqueness constraint for race-free
/// first-touch inserts. Only that constraint is treated as "already exists";
/// a `referral_code` clash surfaces as `UserError::Database`.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn profile_from_row(row: &PgRow) -> Result<UserProfile, sqlx::Error> {
    Ok(UserProfile {
        id: row.try_get("id")?,
        external_user_id: row.try_get("telegram_id")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        language_code: row.try_get("language_code")?,
        referral_code: row.try_get("referral_code")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_external_id(&self, external_id: ExternalUserId) -> UserResult<UserProfile> {
        let row = with_default_timeout(async {
            Ok::<_, UserError>(sqlx::query(SELECT_BY_EXTERNAL_ID)
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await?
        .ok_or(UserError::NotFound)?;

        Ok(profile_from_row(&row)?)
    }

    async fn create(&self, profile: &UserProfile) -> UserResult<CreateOutcome> {
        let result = with_default_timeout(async {
            Ok::<_, UserError>(sqlx::query(INSERT_IF_ABSENT)
                .bind(&profile.id)
                .bind(profile.external_user_id)
                .bind(&profile.username)
                .bind(&profile.first_name)
                .bind(&profile.last_name)
                .bind(&profile.language_code)
                .bind(&profile.referral_code)
                .bind(profile.created_at)
                .bind(profile.updated_at)
                .execute(&self.pool)
                .await?)
        })
        .await?;

        if result.rows_affected() == 0 {
            Ok(CreateOutcome::AlreadyExists)
        } else {
            Ok(CreateOutcome::Created)
        }
    }

    async fn update(&self, profile: &UserProfile) -> UserResult<()> {
        let result = with_default_timeout(async {
            Ok::<_, UserError>(sqlx::query(UPDATE_PROFILE)
                .bind(&profile.username)
                .bind(&profile.first_name)
                .bind(&profile.last_name)
                .bind(&profile.language_code)
                .bind(profile.updated_at)
                .bind(profile.external_user_id)
                .execute(&self.pool)
                .await?)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    async fn ping(&self) -> UserResult<()> {
        with_default_timeout(async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok::<_, UserError>(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, DatabaseConfig};
    use crate::users::{profile_id, referral_code};
    use chrono::{SubsecRound, Utc};

    async fn setup_repo() -> PgUserRepository {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres@localhost/funpot_test".to_string());

        let db = Database::new(&DatabaseConfig::with_url(database_url))
            .await
            .expect("Failed to connect to database");
        db.migrate().await.expect("Failed to run migrations");

        PgUserRepository::new(db.pool().clone())
    }

    fn profile(external_id: i64) -> UserProfile {
        let now = Utc::now().trunc_subsecs(6);
        UserProfile {
            id: profile_id(external_id),
            external_user_id: external_id,
            username: "pg_user".to_string(),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            language_code: "en".to_string(),
            referral_code: referral_code(external_id),
            created_at: now,
            updated_at: now,
        }
    }

    async fn cleanup(repo: &PgUserRepository, external_id: i64) {
        let _ = sqlx::query("DELETE FROM users WHERE telegram_id = $1")
            .bind(external_id)
            .execute(&repo.pool)
            .await;
    }

    #[test]
    fn test_queries_target_external_id() {
        assert!(SELECT_BY_EXTERNAL_ID.ends_with("WHERE telegram_id = $1"));
        assert!(INSERT_IF_ABSENT.contains("ON CONFLICT (telegram_id) DO NOTHING"));
        assert!(!INSERT_IF_ABSENT.contains("ON CONFLICT DO NOTHING"));
        assert!(UPDATE_PROFILE.contains("WHERE telegram_id = $6"));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_create_get_update() {
        let repo = setup_repo().await;
        let external_id = 9_000_000_001;
        cleanup(&repo, external_id).await;

        let mut stored = profile(external_id);
        assert_eq!(repo.create(&stored).await.unwrap(), CreateOutcome::Created);
        assert_eq!(repo.get_by_external_id(external_id).await.unwrap(), stored);

        stored.username = "renamed".to_string();
        repo.update(&stored).await.unwrap();
        let fetched = repo.get_by_external_id(external_id).await.unwrap();
        assert_eq!(fetched.username, "renamed");

        cleanup(&repo, external_id).await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_create_is_insert_if_absent() {
        let repo = setup_repo().await;
        let external_id = 9_000_000_002;
        cleanup(&repo, external_id).await;

        let first = profile(external_id);
        let mut second = profile(external_id);
        second.username = "late_writer".to_string();

        assert_eq!(repo.create(&first).await.unwrap(), CreateOutcome::Created);
        assert_eq!(repo.create(&second).await.unwrap(), CreateOutcome::AlreadyExists);
        let stored = repo.get_by_external_id(external_id).await.unwrap();
        assert_eq!(stored.username, "pg_user");

        cleanup(&repo, external_id).await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_referral_code_clash_is_an_error() {
        let repo = setup_repo().await;
        let first_id = 9_000_000_004;
        let second_id = 9_000_000_005;
        cleanup(&repo, first_id).await;
        cleanup(&repo, second_id).await;

        let first = profile(first_id);
        let mut second = profile(second_id);
        second.referral_code = first.referral_code.clone();

        assert_eq!(repo.create(&first).await.unwrap(), CreateOutcome::Created);
        assert!(matches!(
            repo.create(&second).await,
            Err(UserError::Database(_))
        ));
        assert!(matches!(
            repo.get_by_external_id(second_id).await,
            Err(UserError::NotFound)
        ));

        cleanup(&repo, first_id).await;
        cleanup(&repo, second_id).await;
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pg_missing_rows() {
        let repo = setup_repo().await;
        let external_id = 9_000_000_003;
        cleanup(&repo, external_id).await;

        assert!(matches!(
            repo.get_by_external_id(external_id).await,
            Err(UserError::NotFound)
        ));
        assert!(matches!(
            repo.update(&profile(external_id)).await,
            Err(UserError::NotFound)
        ));
    }
}
