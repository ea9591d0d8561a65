//! Framework-free auth pipelines. Handlers only adapt bytes in and outcomes out.

use std::future::Future;

use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    claims::ClaimSet,
    dto::{LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
    errors::AuthError,
    jwt::JwtKeys,
    validation::validate_registration,
};
use crate::{
    state::AppState,
    users::{normalize_email, NewUser, User, UserStatus},
};

/// A user plus a freshly minted token pair.
#[derive(Debug)]
pub struct AuthSession {
    pub user: PublicUser,
    pub token: String,
    pub refresh_token: String,
}

fn parse_body<T: serde::de::DeserializeOwned>(raw: &[u8]) -> Result<T, AuthError> {
    serde_json::from_slice(raw).map_err(|e| {
        warn!(error = %e, "malformed request body");
        AuthError::MalformedBody
    })
}

/// Like `parse_body`, but a field of the wrong JSON type is named in the error.
fn parse_register_body(raw: &[u8]) -> Result<RegisterRequest, AuthError> {
    let Value::Object(fields) = parse_body::<Value>(raw)? else {
        warn!("register body is not a JSON object");
        return Err(AuthError::MalformedBody);
    };

    match serde_json::from_value(Value::Object(fields.clone())) {
        Ok(req) => Ok(req),
        Err(e) => {
            // Retry each field alone; the first one that still fails is the culprit.
            let culprit = fields.into_iter().find_map(|(key, value)| {
                let single: Map<String, Value> = std::iter::once((key.clone(), value)).collect();
                serde_json::from_value::<RegisterRequest>(Value::Object(single))
                    .is_err()
                    .then_some(key)
            });
            warn!(error = %e, field = ?culprit, "register body has a mistyped field");
            Err(culprit.map_or(AuthError::MalformedBody, AuthError::InvalidField))
        }
    }
}

/// Run one suspending step under the configured request budget.
async fn within<T, E, F>(state: &AppState, step: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, E>>,
    AuthError: From<E>,
{
    Ok(timeout(state.config.request_timeout(), step).await??)
}

async fn hash_password(state: &AppState, password: String) -> Result<String, AuthError> {
    let hasher = state.hasher.clone();
    let joined = timeout(
        state.config.request_timeout(),
        tokio::task::spawn_blocking(move || hasher.hash(&password)),
    )
    .await?;
    joined.map_err(AuthError::internal)?.map_err(AuthError::internal)
}

async fn verify_password(state: &AppState, password: String, hash: String) -> Result<bool, AuthError> {
    let hasher = state.hasher.clone();
    let joined = timeout(
        state.config.request_timeout(),
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)),
    )
    .await?;
    joined.map_err(AuthError::internal)?.map_err(AuthError::internal)
}

/// Sign the access and refresh tokens for `user`. Two separate signatures.
pub fn issue_session(keys: &JwtKeys, user: User) -> Result<AuthSession, AuthError> {
    let subject = ClaimSet {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role,
    };
    let token = keys.sign_access(&subject).map_err(AuthError::internal)?;
    let refresh_token = keys.sign_refresh(&subject).map_err(AuthError::internal)?;
    Ok(AuthSession {
        user: user.into(),
        token,
        refresh_token,
    })
}

/// Validate → check uniqueness → hash → persist → issue tokens.
#[instrument(skip_all)]
pub async fn register(state: &AppState, raw_body: &[u8]) -> Result<AuthSession, AuthError> {
    let req = parse_register_body(raw_body)?;
    let valid = validate_registration(req).inspect_err(|e| {
        warn!(reason = %e, "registration rejected");
    })?;

    let normalized = normalize_email(&valid.email);
    if within(state, state.users.find_by_email(&normalized)).await?.is_some() {
        warn!(email = %normalized, "email already registered");
        return Err(AuthError::EmailTaken);
    }

    let password_hash = hash_password(state, valid.password).await?;

    let new_user = NewUser {
        email: valid.email,
        password_hash,
        first_name: valid.first_name,
        last_name: valid.last_name,
        role: valid.role,
        status: UserStatus::Active,
        grade: valid.grade,
        student_id: valid.student_id,
        phone_number: valid.phone_number,
    };
    let user = within(state, state.users.create(new_user))
        .await
        .inspect_err(|e| {
            if matches!(e, AuthError::EmailTaken) {
                warn!(email = %normalized, "email taken by concurrent registration");
            }
        })?;

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    issue_session(&state.keys, user)
}

#[instrument(skip_all)]
pub async fn login(state: &AppState, raw_body: &[u8]) -> Result<AuthSession, AuthError> {
    let req: LoginRequest = parse_body(raw_body)?;
    let normalized = normalize_email(&req.email);

    let Some(user) = within(state, state.users.find_by_email(&normalized)).await? else {
        warn!(email = %normalized, "login unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(state, req.password, user.password_hash.clone()).await? {
        warn!(email = %normalized, user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    if user.status != UserStatus::Active {
        warn!(user_id = %user.id, status = user.status.code(), "login by inactive user");
        return Err(AuthError::InvalidCredentials);
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    issue_session(&state.keys, user)
}

#[instrument(skip_all)]
pub async fn refresh(state: &AppState, raw_body: &[u8]) -> Result<AuthSession, AuthError> {
    let req: RefreshRequest = parse_body(raw_body)?;
    let claims = state.keys.verify_refresh(&req.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        AuthError::InvalidToken
    })?;

    let user = match within(state, state.users.find_by_id(claims.sub)).await? {
        Some(u) if u.status == UserStatus::Active => u,
        _ => {
            warn!(user_id = %claims.sub, "refresh for missing or inactive user");
            return Err(AuthError::InvalidToken);
        }
    };

    issue_session(&state.keys, user)
}

#[instrument(skip(state))]
pub async fn current_user(state: &AppState, user_id: Uuid) -> Result<PublicUser, AuthError> {
    within(state, state.users.find_by_id(user_id))
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| {
            warn!(%user_id, "token subject no longer exists");
            AuthError::InvalidToken
        })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use serde_json::json;

    use super::*;
    use crate::{
        auth::{claims::TokenKind, password::{BcryptHasher, CredentialHasher}},
        config::DEFAULT_BCRYPT_COST,
        users::{memory::MemoryUserStore, Role, StoreError, UserStore},
    };

    #[derive(Default)]
    struct CountingHasher {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl CredentialHasher for CountingHasher {
        fn hash(&self, plain: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(plain.to_string());
            BcryptHasher::new(4).hash(plain)
        }
        fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
            BcryptHasher::new(4).verify(plain, hash)
        }
    }

    struct FailingHasher;

    impl CredentialHasher for FailingHasher {
        fn hash(&self, _: &str) -> anyhow::Result<String> {
            anyhow::bail!("entropy source exploded at /dev/urandom")
        }
        fn verify(&self, _: &str, _: &str) -> anyhow::Result<bool> {
            anyhow::bail!("unreachable")
        }
    }

    fn body(v: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    fn student(email: &str) -> Vec<u8> {
        body(json!({
            "email": email,
            "password": "password123",
            "firstName": "Sam",
            "lastName": "Student",
            "role": "student",
            "grade": "10",
            "studentId": "STU001"
        }))
    }

    #[tokio::test]
    async fn register_student_returns_user_and_both_tokens() {
        let state = AppState::fake();
        let session = register(&state, &student("sam@school.edu")).await.unwrap();
        assert_eq!(session.user.role, Role::Student);
        assert_eq!(session.user.status, UserStatus::Active);
        assert_ne!(session.token, session.refresh_token);

        let access = state.keys.verify_access(&session.token).unwrap();
        let refresh = state.keys.verify_refresh(&session.refresh_token).unwrap();
        assert_eq!(access.claim_set(), refresh.claim_set());
        assert_eq!(access.sub, session.user.id);
        assert_eq!(access.email, "sam@school.edu");
        assert_eq!(refresh.kind, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn register_hashes_exactly_once() {
        let hasher = Arc::new(CountingHasher::default());
        let users = Arc::new(MemoryUserStore::new());
        let state = AppState::fake_with(users.clone(), hasher.clone());

        register(&state, &student("once@school.edu")).await.unwrap();

        assert_eq!(hasher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(hasher.seen.lock().unwrap().as_slice(), &["password123".to_string()]);
        let stored = users.find_by_email("once@school.edu").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "password123");
        assert!(stored.password_hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn default_cost_is_what_gets_stored() {
        let users = Arc::new(MemoryUserStore::new());
        let hasher = Arc::new(BcryptHasher::new(DEFAULT_BCRYPT_COST));
        let state = AppState::fake_with(users.clone(), hasher);

        register(&state, &student("cost@school.edu")).await.unwrap();

        let stored = users.find_by_email("cost@school.edu").await.unwrap().unwrap();
        assert!(
            stored.password_hash.starts_with("$2b$10$"),
            "unexpected hash prefix: {}",
            stored.password_hash
        );
    }

    #[tokio::test]
    async fn rejected_payloads_never_reach_the_hasher() {
        let hasher = Arc::new(CountingHasher::default());
        let state = AppState::fake_with(Arc::new(MemoryUserStore::new()), hasher.clone());

        register(&state, &student("dup@school.edu")).await.unwrap();
        let err = register(&state, &student("DUP@school.edu")).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
        let err = register(&state, b"\"invalid-json\"").await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedBody));

        assert_eq!(hasher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mistyped_field_is_named_before_validation() {
        let hasher = Arc::new(CountingHasher::default());
        let state = AppState::fake_with(Arc::new(MemoryUserStore::new()), hasher.clone());

        let mut payload: serde_json::Value = serde_json::from_slice(&student("t@school.edu")).unwrap();
        payload["firstName"] = json!(["Sam"]);
        let err = register(&state, &body(payload)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidField(ref f) if f == "firstName"));

        let err = register(&state, b"[1, 2]").await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedBody));
        assert_eq!(hasher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hashing_failure_is_internal_and_opaque() {
        let state = AppState::fake_with(Arc::new(MemoryUserStore::new()), Arc::new(FailingHasher));
        let err = register(&state, &student("x@school.edu")).await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(ref cause) if cause.contains("entropy")));
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[tokio::test]
    async fn store_level_duplicate_maps_to_email_taken() {
        // Store says "not found" on lookup but its constraint rejects the insert.
        struct RacyStore(MemoryUserStore);

        #[async_trait::async_trait]
        impl UserStore for RacyStore {
            async fn find_by_email(&self, _: &str) -> Result<Option<User>, StoreError> {
                Ok(None)
            }
            async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
                self.0.find_by_id(id).await
            }
            async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
                self.0.create(new_user).await
            }
            fn name(&self) -> &'static str {
                "racy"
            }
        }

        let state = AppState::fake_with(
            Arc::new(RacyStore(MemoryUserStore::new())),
            Arc::new(BcryptHasher::new(4)),
        );
        register(&state, &student("race@school.edu")).await.unwrap();
        let err = register(&state, &student("Race@School.edu")).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn login_issues_tokens_for_correct_password_only() {
        let state = AppState::fake();
        let registered = register(&state, &student("Login@School.edu")).await.unwrap();

        let ok = login(
            &state,
            &body(json!({"email": "login@school.edu", "password": "password123"})),
        )
        .await
        .unwrap();
        assert_eq!(ok.user.id, registered.user.id);
        assert_eq!(ok.user.email, "Login@School.edu");

        let wrong = login(
            &state,
            &body(json!({"email": "login@school.edu", "password": "password124"})),
        )
        .await
        .unwrap_err();
        let unknown = login(
            &state,
            &body(json!({"email": "ghost@school.edu", "password": "password123"})),
        )
        .await
        .unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn refresh_rotates_pair_and_rejects_access_tokens() {
        let state = AppState::fake();
        let session = register(&state, &student("rot@school.edu")).await.unwrap();

        let next = refresh(&state, &body(json!({"refreshToken": session.refresh_token})))
            .await
            .unwrap();
        assert_eq!(next.user.id, session.user.id);
        assert_ne!(next.refresh_token, session.refresh_token);

        let err = refresh(&state, &body(json!({"refreshToken": session.token})))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn current_user_for_unknown_id_is_invalid_token() {
        let state = AppState::fake();
        let err = current_user(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }
}
