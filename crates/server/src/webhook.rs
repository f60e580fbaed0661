//! Inbound call webhook
//!
//! The telephony provider posts here when a call arrives. The response
//! is provider-specific call-control markup pointing the provider at the
//! session's websocket stream, or a JSON no-op when the agent declines.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use call_agent_session::SessionError;

use crate::state::AppState;

/// Payload the providers post on an incoming call
#[derive(Debug, Deserialize)]
pub struct CallWebhook {
    pub provider: String,
    /// Provider-native call reference
    pub call_ref: String,
    /// Caller number
    pub from: String,
    /// Business number dialed
    pub to: String,
    #[serde(default = "default_direction")]
    pub direction: String,
}

fn default_direction() -> String {
    "inbound".to_string()
}

#[derive(Debug, Serialize)]
struct DeclineAck {
    action: &'static str,
    reason: &'static str,
}

pub async fn handle_incoming_call(
    State(state): State<Arc<AppState>>,
    Json(webhook): Json<CallWebhook>,
) -> Response {
    if webhook.direction != "inbound" {
        tracing::debug!(direction = %webhook.direction, "ignoring non-inbound webhook");
        return Json(DeclineAck {
            action: "ignore",
            reason: "not_inbound",
        })
        .into_response();
    }

    let settings = state.registry.voice_agent_settings(&webhook.to).await;
    if !settings.enabled {
        tracing::info!(business_number = %webhook.to, "agent disabled for number");
        return Json(DeclineAck {
            action: "decline",
            reason: "agent_disabled",
        })
        .into_response();
    }
    if !settings.business_hours.is_open(Utc::now()) {
        tracing::info!(business_number = %webhook.to, "call outside business hours");
        return Json(DeclineAck {
            action: "decline",
            reason: "outside_business_hours",
        })
        .into_response();
    }

    let Some(provider) = state.providers.get(&webhook.provider) else {
        tracing::warn!(provider = %webhook.provider, "webhook from unknown provider");
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": format!("unknown provider '{}'", webhook.provider) })),
        )
            .into_response();
    };

    let session = match state
        .registry
        .create_session(
            &webhook.to,
            &webhook.from,
            &webhook.provider,
            &webhook.call_ref,
            &settings.language,
        )
        .await
    {
        Ok(session) => session,
        // Store write failed but the session is live in memory; the
        // call proceeds and reconciliation catches the record up.
        Err(SessionError::Persistence { session_id, .. }) => {
            match state.registry.get_session(session_id).await {
                Ok(session) => session,
                Err(err) => {
                    tracing::error!(error = %err, "session unrecoverable after store failure");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": "session creation failed" })),
                    )
                        .into_response();
                }
            }
        }
        Err(SessionError::AtCapacity(active)) => {
            tracing::warn!(active = active, "declining call at session capacity");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DeclineAck {
                    action: "decline",
                    reason: "at_capacity",
                }),
            )
                .into_response();
        }
        Err(err) => {
            tracing::error!(error = %err, "session creation failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "session creation failed" })),
            )
                .into_response();
        }
    };

    let markup = provider.call_control_markup(&session, &state.stream_url(session.id));
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, provider.markup_content_type())],
        markup,
    )
        .into_response()
}
