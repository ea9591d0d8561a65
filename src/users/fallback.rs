use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use super::memory::MemoryUserStore;
use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, User};

/// Durable store with an in-memory standby.
///
/// Writes that fail with `Unavailable` land in the standby so registration
/// still succeeds in degraded mode. Lookups consult both, so accounts created
/// while degraded keep colliding with later registrations.
pub struct FallbackUserStore {
    primary: Arc<dyn UserStore>,
    standby: Arc<MemoryUserStore>,
}

impl FallbackUserStore {
    pub fn new(primary: Arc<dyn UserStore>) -> Self {
        Self {
            primary,
            standby: Arc::new(MemoryUserStore::new()),
        }
    }
}

#[async_trait]
impl UserStore for FallbackUserStore {
    async fn find_by_email(&self, normalized_email: &str) -> Result<Option<User>, StoreError> {
        match self.primary.find_by_email(normalized_email).await {
            Ok(Some(user)) => Ok(Some(user)),
            Ok(None) => self.standby.find_by_email(normalized_email).await,
            Err(e) => {
                warn!(error = %e, store = self.primary.name(), "lookup degraded to memory store");
                self.standby.find_by_email(normalized_email).await
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        match self.primary.find_by_id(id).await {
            Ok(Some(user)) => Ok(Some(user)),
            Ok(None) => self.standby.find_by_id(id).await,
            Err(e) => {
                warn!(error = %e, store = self.primary.name(), "lookup degraded to memory store");
                self.standby.find_by_id(id).await
            }
        }
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        match self.primary.create(new_user.clone()).await {
            Err(StoreError::Unavailable(reason)) => {
                warn!(%reason, store = self.primary.name(), "write degraded to memory store");
                self.standby.create(new_user).await
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::memory::new_user;

    struct DownStore;

    #[async_trait]
    impl UserStore for DownStore {
        async fn find_by_email(&self, _: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn find_by_id(&self, _: Uuid) -> Result<Option<User>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn create(&self, _: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn name(&self) -> &'static str {
            "down"
        }
    }

    #[tokio::test]
    async fn write_falls_back_when_primary_is_down() {
        let store = FallbackUserStore::new(Arc::new(DownStore));
        let user = store.create(new_user("kid@school.edu")).await.unwrap();
        let found = store.find_by_email("kid@school.edu").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(store.find_by_id(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn standby_still_enforces_uniqueness() {
        let store = FallbackUserStore::new(Arc::new(DownStore));
        store.create(new_user("kid@school.edu")).await.unwrap();
        let err = store.create(new_user("KID@school.edu")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn duplicate_from_primary_is_not_masked() {
        let primary = Arc::new(MemoryUserStore::new());
        primary.create(new_user("taken@school.edu")).await.unwrap();
        let store = FallbackUserStore::new(primary);
        let err = store.create(new_user("Taken@School.edu")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }
}
