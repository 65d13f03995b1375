//! HTTP API v1 — session-scoped conversations.
//!
//! Endpoints:
//!
//! - `POST /v1/sessions`                — Start a session with the receptionist
//! - `POST /v1/sessions/{id}/messages`  — Send a message, get the reply
//! - `GET  /v1/sessions/{id}`           — Transcript and session state
//! - `DELETE /v1/sessions/{id}`         — End a session

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use carebridge_core::agent::{AgentRole, Provenance};
use carebridge_core::error::SessionError;
use carebridge_core::session::{SessionId, TurnRole};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::SharedState;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/sessions", post(create_session_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(end_session_handler),
        )
        .route("/sessions/{id}/messages", post(send_message_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Caller-chosen handle; generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub active_agent: AgentRole,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub response: String,
    /// "Receptionist", "Clinical Specialist" or "System"
    pub speaker: String,
    #[serde(default)]
    pub provenance: Vec<Provenance>,
    pub active_agent: AgentRole,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TurnDto {
    pub id: String,
    pub role: TurnRole,
    pub content: String,
    #[serde(default)]
    pub source_agent: Option<AgentRole>,
    #[serde(default)]
    pub provenance: Vec<Provenance>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDetailResponse {
    pub session_id: String,
    pub active_agent: AgentRole,
    pub identity_confirmed: bool,
    #[serde(default)]
    pub patient_name: Option<String>,
    pub created_at: String,
    pub transcript: Vec<TurnDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn session_error(err: SessionError) -> ApiError {
    match err {
        SessionError::NotFound(_) => api_error(StatusCode::NOT_FOUND, err.to_string()),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn create_session_handler(
    State(state): State<SharedState>,
    payload: Option<Json<CreateSessionRequest>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let requested = payload.and_then(|Json(p)| p.session_id);
    let id = match requested.filter(|s| !s.trim().is_empty()) {
        Some(id) => state.assistant.new_session_with_id(SessionId::from(id.trim())),
        None => state.assistant.new_session(),
    };

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: id.to_string(),
            active_agent: AgentRole::Receptionist,
        }),
    )
}

async fn send_message_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    info!(session_id = %id, message_len = payload.message.len(), "v1 message received");

    let exchange = state
        .assistant
        .exchange(&SessionId::from(&id), &payload.message)
        .await
        .map_err(session_error)?;

    let speaker = exchange
        .turn
        .source_agent
        .map(|a| a.label())
        .unwrap_or("System")
        .to_string();

    Ok(Json(MessageResponse {
        response: exchange.turn.content,
        speaker,
        provenance: exchange.turn.provenance,
        active_agent: exchange.active_agent,
    }))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let session = state
        .assistant
        .snapshot(&SessionId::from(&id))
        .await
        .map_err(session_error)?;

    Ok(Json(SessionDetailResponse {
        session_id: session.id().to_string(),
        active_agent: session.active_agent(),
        identity_confirmed: session.identity_confirmed(),
        patient_name: session
            .verified_patient()
            .filter(|_| session.identity_confirmed())
            .map(|p| p.patient_name.clone()),
        created_at: session.created_at().to_rfc3339(),
        transcript: session
            .transcript()
            .iter()
            .map(|t| TurnDto {
                id: t.id.clone(),
                role: t.role,
                content: t.content.clone(),
                source_agent: t.source_agent,
                provenance: t.provenance.clone(),
                timestamp: t.timestamp.to_rfc3339(),
            })
            .collect(),
    }))
}

async fn end_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .assistant
        .end_session(&SessionId::from(&id))
        .map_err(session_error)?;
    Ok(StatusCode::NO_CONTENT)
}
