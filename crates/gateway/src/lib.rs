//! HTTP gateway for carebridge.
//!
//! Exposes a health check, a legacy single-endpoint chat (`POST /chat`)
//! and the session-scoped v1 API. Every route talks to one shared
//! [`Assistant`].
//!
//! Built on Axum.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::Json,
    routing::{get, post},
};
use carebridge_agent::Assistant;
use carebridge_core::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub assistant: Arc<Assistant>,
    pub started_at: DateTime<Utc>,
}

impl GatewayState {
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self {
            assistant,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router: health, legacy chat and the v1 API.
///
/// Layers: 64 KB body limit, CORS for a local UI, HTTP trace logging.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:8501"),
            HeaderValue::from_static("http://127.0.0.1:8501"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Serve the gateway until the process is stopped.
pub async fn serve(
    host: &str,
    port: u16,
    assistant: Arc<Assistant>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");
    let app = build_router(Arc::new(GatewayState::new(assistant)));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_sessions: usize,
    pub uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        active_sessions: state.assistant.sessions().len(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Continue this session; created on first use
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

/// One-endpoint chat for simple front ends: the session is created on
/// first use and reused while the caller sends the same `session_id`.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<api_v1::ErrorResponse>)> {
    if payload.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(api_v1::ErrorResponse {
                error: "message must not be empty".into(),
            }),
        ));
    }

    let id = match payload.session_id.filter(|s| !s.trim().is_empty()) {
        Some(id) => state.assistant.new_session_with_id(SessionId::from(id.trim())),
        None => state.assistant.new_session(),
    };

    info!(session_id = %id, message_len = payload.message.len(), "Chat message received");

    match state.assistant.send_message(&id, &payload.message).await {
        Ok(response) => Ok(Json(ChatResponse {
            response,
            session_id: id.to_string(),
        })),
        Err(e) => {
            warn!(session_id = %id, error = %e, "Chat session vanished mid-request");
            Err((
                StatusCode::NOT_FOUND,
                Json(api_v1::ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
