use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{error, info, instrument, warn};

use super::dto::{ContactRequest, ContactResponse};
use crate::{auth::validation::is_valid_email, mailer::EmailMessage, state::AppState};

type ContactResult = Result<Json<ContactResponse>, (StatusCode, Json<ContactResponse>)>;

pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/contact", post(submit))
}

fn reject(status: StatusCode, message: &str) -> (StatusCode, Json<ContactResponse>) {
    (
        status,
        Json(ContactResponse {
            success: false,
            message: message.into(),
        }),
    )
}

#[instrument(skip(state, body))]
pub async fn submit(State(state): State<AppState>, body: Bytes) -> ContactResult {
    let req: ContactRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "malformed contact body");
        reject(StatusCode::BAD_REQUEST, "Invalid request body")
    })?;

    if req.name.trim().is_empty() || req.message.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "Name and message are required"));
    }
    if !is_valid_email(&req.email) {
        return Err(reject(StatusCode::BAD_REQUEST, "Invalid email format"));
    }

    let subject = req
        .subject
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("Website enquiry from {}", req.name.trim()));
    let message = EmailMessage {
        to: state.config.contact_inbox.clone(),
        reply_to: Some(req.email.clone()),
        subject,
        body: format!("From: {} <{}>\n\n{}", req.name.trim(), req.email, req.message),
    };

    if let Err(e) = state.mailer.send(&message).await {
        error!(error = %e, "contact email failed");
        return Err(reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not send your message, please try again later",
        ));
    }

    info!(from = %req.email, "contact message accepted");
    Ok(Json(ContactResponse {
        success: true,
        message: "Thank you, we will be in touch shortly".into(),
    }))
}
