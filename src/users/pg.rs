use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, User, UserRow};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, status, \
     grade, student_id, phone_number, created_at, updated_at";

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    error!(error = %e, "user store query failed");
    StoreError::Unavailable(e.to_string())
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, StoreError> {
    row.map(User::try_from)
        .transpose()
        .map_err(StoreError::Unavailable)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, normalized_email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = $1"
        ))
        .bind(normalized_email)
        .fetch_optional(&self.db)
        .await
        .map_err(unavailable)?;
        into_user(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(unavailable)?;
        into_user(row)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let normalized = new_user.normalized_email();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role, status,
                               grade, student_id, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.role.code())
        .bind(new_user.status.code())
        .bind(&new_user.grade)
        .bind(&new_user.student_id)
        .bind(&new_user.phone_number)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            let unique_violation = e
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if unique_violation {
                StoreError::Duplicate(normalized)
            } else {
                unavailable(e)
            }
        })?;

        User::try_from(row).map_err(StoreError::Unavailable)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
