//! In-memory `UserRepository` for development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::UserRepository;
use crate::users::{CreateOutcome, ExternalUserId, UserError, UserProfile, UserResult};

/// Process-local profile store keyed by external id.
///
/// Insert-if-absent runs under the write lock, so concurrent first syncs
/// for one external id converge on a single row just like the unique
/// constraint does in PostgreSQL.
#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    profiles: Arc<RwLock<HashMap<ExternalUserId, UserProfile>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles
    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }

    /// Drop a stored profile, returning it if present
    pub async fn remove(&self, external_id: ExternalUserId) -> Option<UserProfile> {
        self.profiles.write().await.remove(&external_id)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_by_external_id(&self, external_id: ExternalUserId) -> UserResult<UserProfile> {
        self.profiles
            .read()
            .await
            .get(&external_id)
            .cloned()
            .ok_or(UserError::NotFound)
    }

    async fn create(&self, profile: &UserProfile) -> UserResult<CreateOutcome> {
        let mut profiles = self.profiles.write().await;
        match profiles.entry(profile.external_user_id) {
            Entry::Occupied(_) => Ok(CreateOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(profile.clone());
                Ok(CreateOutcome::Created)
            }
        }
    }

    async fn update(&self, profile: &UserProfile) -> UserResult<()> {
        let mut profiles = self.profiles.write().await;
        let stored = profiles
            .get_mut(&profile.external_user_id)
            .ok_or(UserError::NotFound)?;
        *stored = profile.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(external_id: i64, username: &str) -> UserProfile {
        let now = Utc::now();
        UserProfile {
            id: format!("ext_{external_id}"),
            external_user_id: external_id,
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            language_code: String::new(),
            referral_code: "AAAAAAAAAA".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = InMemoryUserRepository::new();
        assert!(matches!(
            repo.get_by_external_id(1).await,
            Err(UserError::NotFound)
        ));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_keeps_first_writer() {
        let repo = InMemoryUserRepository::new();

        assert_eq!(
            repo.create(&profile(1, "first")).await.unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            repo.create(&profile(1, "second")).await.unwrap(),
            CreateOutcome::AlreadyExists
        );

        let stored = repo.get_by_external_id(1).await.unwrap();
        assert_eq!(stored.username, "first");
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_requires_existing_row() {
        let repo = InMemoryUserRepository::new();
        assert!(matches!(
            repo.update(&profile(5, "ghost")).await,
            Err(UserError::NotFound)
        ));

        repo.create(&profile(5, "before")).await.unwrap();
        repo.update(&profile(5, "after")).await.unwrap();
        assert_eq!(repo.get_by_external_id(5).await.unwrap().username, "after");

        repo.remove(5).await;
        assert!(matches!(
            repo.update(&profile(5, "vanished")).await,
            Err(UserError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_creates_store_one_row() {
        let repo = InMemoryUserRepository::new();

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.create(&profile(77, &format!("writer{i}"))).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == CreateOutcome::Created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(repo.len().await, 1);
    }
}
