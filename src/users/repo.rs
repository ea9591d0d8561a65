use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::repo_types::{NewUser, User};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store's uniqueness constraint on the normalized email rejected the write.
    #[error("email already exists: {0}")]
    Duplicate(String),

    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence operations for portal users.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Look a user up by lower-cased email.
    async fn find_by_email(&self, normalized_email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Insert a user. Must fail with `Duplicate` if the normalized email is taken,
    /// even when the caller already checked.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
