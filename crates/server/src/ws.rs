//! Websocket audio stream endpoint
//!
//! One socket per call. Binary messages are audio frames; text messages
//! are JSON control and telemetry in both directions.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use call_agent_core::CallStatus;
use call_agent_streaming::{AudioChunkFrame, OutboundEvent, StreamingError};

use crate::state::AppState;

/// Control messages a stream client may send as JSON text
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Caller hung up cleanly
    Hangup,
    /// Keepalive, no action needed
    Ping,
}

pub async fn stream_socket(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, session_id, socket))
}

async fn handle_socket(state: Arc<AppState>, session_id: Uuid, socket: WebSocket) {
    let (mut sink, mut source) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundEvent>(64);

    if let Err(err) = state
        .stream_engine
        .open_stream(session_id, outbound_tx)
        .await
    {
        tracing::warn!(session_id = %session_id, error = %err, "stream rejected");
        let _ = sink.send(rejection_close(&err)).await;
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let is_hangup = matches!(event, OutboundEvent::Hangup { .. });
            let message = match &event {
                OutboundEvent::Audio(frame) => Message::Binary(frame.encode().to_vec()),
                other => match other.to_text() {
                    Some(text) => Message::Text(text),
                    None => continue,
                },
            };
            if sink.send(message).await.is_err() {
                break;
            }
            if is_hangup {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    });

    while let Some(result) = source.next().await {
        match result {
            Ok(Message::Binary(data)) => match AudioChunkFrame::decode(Bytes::from(data)) {
                Ok(frame) => {
                    if let Err(err) = state.stream_engine.ingest_frame(session_id, frame).await {
                        tracing::debug!(session_id = %session_id, error = %err, "frame rejected");
                        break;
                    }
                }
                Err(err) => {
                    // Malformed frames are dropped, not fatal.
                    tracing::warn!(session_id = %session_id, error = %err, "malformed audio frame");
                }
            },
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Hangup) => {
                    state
                        .stream_engine
                        .finalize(session_id, CallStatus::Ended, "caller_hangup")
                        .await;
                    break;
                }
                Ok(ClientMessage::Ping) => {}
                Err(_) => {
                    tracing::debug!(session_id = %session_id, "unrecognized control message");
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    // No-op when a terminal path already settled the call.
    state.stream_engine.on_channel_closed(session_id).await;
    writer.abort();
}

/// Close frame for a stream the engine refused to open. The client gets
/// a policy-violation code and the rejection reason, not a bare close.
fn rejection_close(err: &StreamingError) -> Message {
    Message::Close(Some(CloseFrame {
        code: close_code::POLICY,
        reason: err.to_string().into(),
    }))
}
