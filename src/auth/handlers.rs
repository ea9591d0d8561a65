use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument};

use super::{
    dto::AuthResponse,
    errors::AuthError,
    extractors::AuthUser,
    services::{self, AuthSession},
};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(get_me))
}

fn session_response(status: StatusCode, message: &str, session: AuthSession) -> Response {
    let body = AuthResponse {
        success: true,
        message: Some(message.into()),
        user: Some(session.user),
        token: Some(session.token),
        refresh_token: Some(session.refresh_token),
    };
    (status, Json(body)).into_response()
}

fn log_internal(err: AuthError) -> AuthError {
    if let AuthError::Internal(cause) = &err {
        error!(%cause, "auth request failed");
    }
    err
}

/// Takes raw bytes so an unparsable body becomes our 400 envelope.
#[instrument(skip(state, body))]
pub async fn register(State(state): State<AppState>, body: Bytes) -> Result<Response, AuthError> {
    let session = services::register(&state, &body).await.map_err(log_internal)?;
    Ok(session_response(
        StatusCode::CREATED,
        "User registered successfully",
        session,
    ))
}

#[instrument(skip(state, body))]
pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<Response, AuthError> {
    let session = services::login(&state, &body).await.map_err(log_internal)?;
    Ok(session_response(StatusCode::OK, "Login successful", session))
}

#[instrument(skip(state, body))]
pub async fn refresh(State(state): State<AppState>, body: Bytes) -> Result<Response, AuthError> {
    let session = services::refresh(&state, &body).await.map_err(log_internal)?;
    Ok(session_response(StatusCode::OK, "Token refreshed", session))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AuthResponse>, AuthError> {
    let user = services::current_user(&state, user_id)
        .await
        .map_err(log_internal)?;
    Ok(Json(AuthResponse {
        success: true,
        user: Some(user),
        ..Default::default()
    }))
}
