//! REST endpoints for the registration conversation.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::fields::Field;
use super::model::{RegistrationRecord, RegistrationSession, TranscriptMessage};
use super::processor::RegistrationService;
use super::sequencer::{NextStep, next_field};
use crate::error::{Error, RegistrationError};

/// Shared state for registration routes.
#[derive(Clone)]
pub struct RegistrationRouteState {
    pub service: Arc<RegistrationService>,
}

/// Body of `POST /registration-flow`.
///
/// An absent or empty `message` starts the session; anything else continues it.
#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Read-only view of a session returned by `GET /registration-flow/{session_id}`.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session: RegistrationSession,
    pub registration: Option<RegistrationRecord>,
    pub transcript: Vec<TranscriptMessage>,
    /// Field the next message will be parsed into; `None` once complete.
    pub next_field: Option<Field>,
}

/// GET /healthcheck
async fn healthcheck() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// POST /registration-flow
async fn registration_flow(
    State(state): State<RegistrationRouteState>,
    Json(request): Json<RegistrationRequest>,
) -> Response {
    let result = match request.message.as_deref() {
        None | Some("") => {
            state
                .service
                .start(&request.user_id, &request.session_id)
                .await
        }
        Some(message) => state.service.handle(&request.session_id, message).await,
    };

    match result {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /registration-flow/{session_id}
async fn get_session(
    State(state): State<RegistrationRouteState>,
    Path(session_id): Path<String>,
) -> Response {
    match snapshot(&state.service, &session_id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

async fn snapshot(
    service: &RegistrationService,
    session_id: &str,
) -> Result<SessionSnapshot, Error> {
    let db = service.db();
    let session = db
        .get_session(session_id)
        .await?
        .ok_or_else(|| RegistrationError::SessionNotFound {
            session_id: session_id.to_string(),
        })?;
    let registration = service.record(session_id).await?;
    let transcript = db.list_messages(session_id).await?;
    let next_field = match next_field(registration.as_ref()) {
        NextStep::Prompt(prompt) => Some(prompt.field),
        NextStep::Complete => None,
    };

    Ok(SessionSnapshot {
        session,
        registration,
        transcript,
        next_field,
    })
}

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::Registration(RegistrationError::SessionNotFound { .. }) => StatusCode::NOT_FOUND,
        Error::Registration(RegistrationError::DuplicateSession { .. }) => StatusCode::CONFLICT,
        _ => {
            tracing::error!(error = %err, "Registration request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

/// Build the registration REST routes.
pub fn registration_routes(state: RegistrationRouteState) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/registration-flow", post(registration_flow))
        .route("/registration-flow/{session_id}", get(get_session))
        .with_state(state)
}

/// Full HTTP application: registration routes plus request tracing and CORS.
pub fn app(service: Arc<RegistrationService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    registration_routes(RegistrationRouteState { service })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
