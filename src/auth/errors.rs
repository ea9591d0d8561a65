use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use super::{dto::AuthResponse, validation::ValidationError};
use crate::users::StoreError;

/// Every way an auth request can fail. Display text is what the client sees.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid request body")]
    MalformedBody,

    /// Well-formed JSON object with one field of the wrong type.
    #[error("Invalid request body: {0} has the wrong type")]
    InvalidField(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("User with this email already exists")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    /// Cause is for server logs only.
    #[error("Internal server error")]
    Internal(String),
}

impl AuthError {
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        Self::Internal(cause.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MalformedBody | AuthError::InvalidField(_) | AuthError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(_) => AuthError::EmailTaken,
            StoreError::Unavailable(reason) => AuthError::Internal(reason),
        }
    }
}

impl From<tokio::time::error::Elapsed> for AuthError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AuthError::Internal("request step timed out".into())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(AuthResponse::failure(self.to_string()))).into_response()
    }
}
