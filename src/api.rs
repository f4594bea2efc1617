//! REST API server
//!
//! Exposes the turn orchestrator and session lifecycle over HTTP.
//! Every response body is a JSON object carrying a `success` flag.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::agent::TurnOrchestrator;
use crate::error::ChatError;
use crate::models::CallOptions;
use crate::prompts::DEFAULT_PROFILE;
use crate::sessions::SessionService;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub prompt_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub options: CallOptions,
}

type ApiReply = (StatusCode, Json<Value>);

fn failure(status: StatusCode, error: impl Into<String>) -> ApiReply {
    (
        status,
        Json(json!({
            "success": false,
            "error": error.into(),
        })),
    )
}

fn error_reply(err: ChatError) -> ApiReply {
    let status = match err {
        ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ChatError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    failure(status, err.to_string())
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub sessions: Arc<SessionService>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "chat-session-orchestrator",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Session Endpoints
/// =============================

async fn create_session(
    State(state): State<ApiState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiReply {
    // A missing or empty body means the default profile
    let req = payload.map(|Json(req)| req).unwrap_or_default();
    let prompt_type = req.prompt_type.as_deref().unwrap_or(DEFAULT_PROFILE);

    let session_id = state.sessions.create_session(prompt_type).await;
    let info = state.sessions.store().info(&session_id).await;

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "session_id": session_id,
            "prompt_type": info.and_then(|i| i.prompt_type),
            "message": "Session created",
        })),
    )
}

async fn send_message(
    State(state): State<ApiState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiReply {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected message request: {}", rejection);
            return error_reply(ChatError::InvalidInput(
                "request body is missing or invalid".to_string(),
            ));
        }
    };

    let message = req.message.trim();
    if message.is_empty() {
        return error_reply(ChatError::InvalidInput(
            "message content must not be empty".to_string(),
        ));
    }

    let session_id = req.session_id.as_deref().filter(|id| !id.trim().is_empty());
    let result = state
        .orchestrator
        .submit_turn(session_id, message, req.options)
        .await;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, Json(json!(result)))
}

async fn get_history(State(state): State<ApiState>, Path(session_id): Path<String>) -> ApiReply {
    match state.sessions.history(&session_id).await {
        Ok(view) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "session_id": session_id,
                "summary": view.summary,
                "history": view.history,
            })),
        ),
        Err(e) => error_reply(e),
    }
}

async fn clear_session(State(state): State<ApiState>, Path(session_id): Path<String>) -> ApiReply {
    state.sessions.clear(&session_id).await;
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Conversation cleared",
        })),
    )
}

async fn delete_session(State(state): State<ApiState>, Path(session_id): Path<String>) -> ApiReply {
    if state.sessions.delete(&session_id).await {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Session deleted",
            })),
        )
    } else {
        error_reply(ChatError::SessionNotFound(session_id))
    }
}

async fn list_sessions(State(state): State<ApiState>) -> ApiReply {
    let sessions = state.sessions.list_sessions().await;
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "total_sessions": sessions.len(),
            "sessions": sessions,
        })),
    )
}

async fn export_session(State(state): State<ApiState>, Path(session_id): Path<String>) -> ApiReply {
    match state.sessions.export(&session_id).await {
        Ok(export) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": export,
            })),
        ),
        Err(e) => error_reply(e),
    }
}

async fn get_config(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "config": state.sessions.config_view(),
    }))
}

async fn fallback() -> ApiReply {
    failure(StatusCode::NOT_FOUND, "API endpoint not found")
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat/session", post(create_session))
        .route("/api/chat/session/:session_id", axum::routing::delete(delete_session))
        .route("/api/chat/message", post(send_message))
        .route("/api/chat/history/:session_id", get(get_history))
        .route("/api/chat/clear/:session_id", post(clear_session))
        .route("/api/chat/sessions", get(list_sessions))
        .route("/api/chat/export/:session_id", get(export_session))
        .route("/api/config", get(get_config))
        .fallback(fallback)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(state: ApiState, port: u16) -> crate::Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
