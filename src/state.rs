use std::sync::Arc;

use crate::auth::jwt::JwtKeys;
use crate::auth::password::{BcryptHasher, CredentialHasher};
use crate::config::AppConfig;
use crate::db;
use crate::mailer::{EmailSender, LogEmailSender};
use crate::users::UserStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub keys: JwtKeys,
    pub mailer: Arc<dyn EmailSender>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let users = db::user_store(&config).await?;
        let hasher = Arc::new(BcryptHasher::new(config.bcrypt_cost));
        Ok(Self::from_parts(config, users, hasher, Arc::new(LogEmailSender)))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        let keys = JwtKeys::from_config(&config.jwt);
        Self {
            config,
            users,
            hasher,
            keys,
            mailer,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// In-memory store, cheap bcrypt, log mailer.
    pub fn fake() -> Self {
        Self::fake_with(
            Arc::new(crate::users::memory::MemoryUserStore::new()),
            Arc::new(BcryptHasher::new(4)),
        )
    }

    pub fn fake_with(users: Arc<dyn UserStore>, hasher: Arc<dyn CredentialHasher>) -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            store: crate::config::StoreKind::Memory,
            store_fallback: false,
            jwt: crate::config::JwtConfig {
                secret: "test-access-secret".into(),
                refresh_secret: "test-refresh-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            bcrypt_cost: 4,
            request_timeout_secs: 5,
            contact_inbox: "office@test.local".into(),
        });
        Self::from_parts(config, users, hasher, Arc::new(LogEmailSender))
    }
}
