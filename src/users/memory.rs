use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, User};

/// Process-local store keyed by normalized email.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, User>>, StoreError> {
        self.users
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().map(|u| u.len()).unwrap_or(0)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, normalized_email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.get(normalized_email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.values().find(|u| u.id == id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let key = new_user.normalized_email();
        let mut users = self.lock()?;
        if users.contains_key(&key) {
            return Err(StoreError::Duplicate(key));
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            role: new_user.role,
            status: new_user.status,
            grade: new_user.grade,
            student_id: new_user.student_id,
            phone_number: new_user.phone_number,
            created_at: now,
            updated_at: now,
        };
        users.insert(key, user.clone());
        Ok(user)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
pub(crate) fn new_user(email: &str) -> NewUser {
    use super::repo_types::{Role, UserStatus};

    NewUser {
        email: email.into(),
        password_hash: "$2b$04$hash".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        role: Role::Student,
        status: UserStatus::Active,
        grade: Some("9".into()),
        student_id: Some("S-001".into()),
        phone_number: None,
    }
}
