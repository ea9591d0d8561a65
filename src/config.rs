use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Upper bound for either token lifetime (ten years).
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Which `UserStore` backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub store: StoreKind,
    pub store_fallback: bool,
    pub jwt: JwtConfig,
    pub bcrypt_cost: u32,
    pub request_timeout_secs: u64,
    pub contact_inbox: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let store = match std::env::var("USER_STORE").ok().as_deref() {
            Some("postgres") => StoreKind::Postgres,
            Some("memory") => StoreKind::Memory,
            Some(other) => anyhow::bail!("USER_STORE must be `postgres` or `memory`, got `{other}`"),
            None if database_url.is_some() => StoreKind::Postgres,
            None => StoreKind::Memory,
        };
        if store == StoreKind::Postgres && database_url.is_none() {
            anyhow::bail!("USER_STORE=postgres requires DATABASE_URL");
        }

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let jwt = JwtConfig {
            refresh_secret: std::env::var("JWT_REFRESH_SECRET").unwrap_or_else(|_| secret.clone()),
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "schoolportal".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "schoolportal-users".into()),
            ttl_minutes: check_ttl("JWT_TTL_MINUTES", parse_var("JWT_TTL_MINUTES", 60)?)?,
            refresh_ttl_minutes: check_ttl(
                "JWT_REFRESH_TTL_MINUTES",
                parse_var("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 7)?,
            )?,
        };

        let bcrypt_cost = parse_var("BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            anyhow::bail!("BCRYPT_COST must be within 4..=31, got {bcrypt_cost}");
        }

        Ok(Self {
            database_url,
            store,
            store_fallback: parse_var("USER_STORE_FALLBACK", true)?,
            jwt,
            bcrypt_cost,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 10)?,
            contact_inbox: std::env::var("CONTACT_INBOX")
                .unwrap_or_else(|_| "admissions@school.local".into()),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn check_ttl(key: &str, minutes: i64) -> anyhow::Result<i64> {
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!("{key} must be within 1..={MAX_TTL_MINUTES}, got {minutes}");
    }
    Ok(minutes)
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: `{raw}`")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default_when_unset() {
        let v: u64 = parse_var("SCHOOLPORTAL_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn parse_var_reports_the_offending_key() {
        std::env::set_var("SCHOOLPORTAL_TEST_BAD_NUMBER", "ten");
        let err = parse_var::<u32>("SCHOOLPORTAL_TEST_BAD_NUMBER", 10).unwrap_err();
        assert!(err.to_string().contains("SCHOOLPORTAL_TEST_BAD_NUMBER"));
    }

    #[test]
    fn default_bcrypt_cost_is_ten() {
        assert_eq!(DEFAULT_BCRYPT_COST, 10);
    }

    #[test]
    fn ttl_must_be_positive_and_bounded() {
        assert_eq!(check_ttl("JWT_TTL_MINUTES", 60).unwrap(), 60);
        assert_eq!(check_ttl("JWT_TTL_MINUTES", MAX_TTL_MINUTES).unwrap(), MAX_TTL_MINUTES);
        for bad in [0, -5, MAX_TTL_MINUTES + 1, i64::MAX] {
            let err = check_ttl("JWT_REFRESH_TTL_MINUTES", bad).unwrap_err();
            assert!(err.to_string().contains("JWT_REFRESH_TTL_MINUTES"), "{err}");
        }
    }

    #[test]
    fn parse_var_reads_bools() {
        std::env::set_var("SCHOOLPORTAL_TEST_FLAG", "false");
        assert!(!parse_var("SCHOOLPORTAL_TEST_FLAG", true).unwrap());
    }
}
