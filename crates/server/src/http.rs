//! HTTP router and inspection API

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use call_agent_config::VoiceAgentSettings;
use call_agent_session::SessionError;
use call_agent_storage::{ConversationStore, SettingsStore};

use crate::state::AppState;
use crate::{webhook, ws};

pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/webhook/call", post(webhook::handle_incoming_call))
        .route("/stream/:session_id", get(ws::stream_socket))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:session_id", get(get_session))
        .route("/api/sessions/:session_id/turns", get(get_turns))
        .route(
            "/api/settings/:business_number",
            get(get_settings).put(set_settings),
        )
        .layer(TraceLayer::new_for_http());

    if state.settings.server.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ready",
        "active_sessions": state.registry.active_count(),
        "open_streams": state.stream_engine.open_stream_count(),
        "providers": state.providers.names(),
    }))
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.active_sessions())
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Response {
    match state.registry.get_session(session_id).await {
        Ok(session) => Json(session).into_response(),
        Err(SessionError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "session not found" })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(session_id = %session_id, error = %err, "session lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "lookup failed" })),
            )
                .into_response()
        }
    }
}

/// Turn history: the live conversation while the call is up, the stored
/// batch afterwards.
async fn get_turns(State(state): State<Arc<AppState>>, Path(session_id): Path<Uuid>) -> Response {
    if let Some(turns) = state.intelligence.history(session_id).await {
        return Json(turns).into_response();
    }
    match state.conversations.load_turns(session_id).await {
        Ok(turns) => Json(turns).into_response(),
        Err(err) => {
            tracing::error!(session_id = %session_id, error = %err, "turn history load failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "history load failed" })),
            )
                .into_response()
        }
    }
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(business_number): Path<String>,
) -> Response {
    let settings = state.registry.voice_agent_settings(&business_number).await;
    Json(settings).into_response()
}

async fn set_settings(
    State(state): State<Arc<AppState>>,
    Path(business_number): Path<String>,
    Json(settings): Json<VoiceAgentSettings>,
) -> Response {
    match state
        .settings_store
        .set_voice_agent_settings(&business_number, settings)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            tracing::error!(business_number = %business_number, error = %err, "settings write failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "settings write failed" })),
            )
                .into_response()
        }
    }
}
