//! Per-call stream state

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex, MutexGuard};
use tokio::time::Instant;
use tokio::task::JoinHandle;
use uuid::Uuid;

use call_agent_config::{InterruptionConfig, VoiceAgentSettings};
use call_agent_provider::CallHandler;

use crate::frame::AudioChunkFrame;

/// Events the engine pushes back over the stream channel.
///
/// `Audio` becomes a binary frame on the socket; everything else is a
/// JSON text message.
#[derive(Debug, Clone)]
pub enum OutboundEvent {
    /// Receipt for an inbound frame
    Ack { sequence: u32 },
    /// Synthesized agent audio
    Audio(AudioChunkFrame),
    /// Transcription telemetry
    Transcript { text: String, is_final: bool },
    /// What the agent is about to say
    AgentText { text: String },
    /// Playback was cut off by the customer speaking
    Interrupted,
    /// Call is being handed to a human
    Transfer { target: String, reason: String },
    /// Call is over; the channel closes after this
    Hangup { reason: String },
}

/// JSON shape of the non-audio events
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage<'a> {
    Ack { sequence: u32 },
    Transcript { text: &'a str, is_final: bool },
    AgentText { text: &'a str },
    Interrupted,
    Transfer { target: &'a str, reason: &'a str },
    Hangup { reason: &'a str },
}

impl OutboundEvent {
    /// Render the event as a JSON text payload. `None` for audio, which
    /// goes out binary.
    pub fn to_text(&self) -> Option<String> {
        let message = match self {
            OutboundEvent::Audio(_) => return None,
            OutboundEvent::Ack { sequence } => OutboundMessage::Ack {
                sequence: *sequence,
            },
            OutboundEvent::Transcript { text, is_final } => OutboundMessage::Transcript {
                text,
                is_final: *is_final,
            },
            OutboundEvent::AgentText { text } => OutboundMessage::AgentText { text },
            OutboundEvent::Interrupted => OutboundMessage::Interrupted,
            OutboundEvent::Transfer { target, reason } => {
                OutboundMessage::Transfer { target, reason }
            }
            OutboundEvent::Hangup { reason } => OutboundMessage::Hangup { reason },
        };
        // The message shape contains nothing unserializable.
        serde_json::to_string(&message).ok()
    }
}

/// Live state of one call's audio stream
pub struct StreamState {
    pub session_id: Uuid,
    /// Settings snapshot taken when the stream opened
    pub settings: VoiceAgentSettings,
    pub handler: Arc<dyn CallHandler>,
    outbound: mpsc::Sender<OutboundEvent>,

    buffer: Mutex<Vec<u8>>,
    window_bytes: usize,
    prev_energy: Mutex<f32>,
    last_audio: Mutex<Instant>,
    opened_at: Instant,
    closed: AtomicBool,
    out_sequence: AtomicU32,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    dispatch: AsyncMutex<()>,
}

impl StreamState {
    pub fn new(
        session_id: Uuid,
        settings: VoiceAgentSettings,
        handler: Arc<dyn CallHandler>,
        outbound: mpsc::Sender<OutboundEvent>,
        window_bytes: usize,
    ) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            settings,
            handler,
            outbound,
            buffer: Mutex::new(Vec::with_capacity(window_bytes)),
            window_bytes,
            prev_energy: Mutex::new(0.0),
            last_audio: Mutex::new(now),
            opened_at: now,
            closed: AtomicBool::new(false),
            out_sequence: AtomicU32::new(0),
            tasks: Mutex::new(Vec::new()),
            dispatch: AsyncMutex::new(()),
        }
    }

    /// Append audio; returns a full transcription window when one fills.
    pub fn push_audio(&self, payload: &[u8]) -> Option<Vec<u8>> {
        let mut buffer = self.buffer.lock();
        buffer.extend_from_slice(payload);
        if buffer.len() >= self.window_bytes {
            Some(std::mem::replace(
                &mut *buffer,
                Vec::with_capacity(self.window_bytes),
            ))
        } else {
            None
        }
    }

    /// Interruption check against the previous chunk's energy. Updates
    /// the rolling energy either way.
    pub fn detect_interruption(&self, energy: f32, config: &InterruptionConfig) -> bool {
        let mut prev = self.prev_energy.lock();
        let interrupted = energy > config.energy_floor && energy > *prev * config.energy_ratio
            && *prev > 0.0;
        *prev = energy;
        interrupted
    }

    pub fn touch_audio(&self) {
        *self.last_audio.lock() = Instant::now();
    }

    pub fn seconds_since_audio(&self) -> f32 {
        self.last_audio.lock().elapsed().as_secs_f32()
    }

    /// Milliseconds since the stream opened, for outbound frame stamps
    pub fn elapsed_ms(&self) -> u64 {
        self.opened_at.elapsed().as_millis() as u64
    }

    pub fn next_sequence(&self) -> u32 {
        self.out_sequence.fetch_add(1, Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark the stream closed. Returns true exactly once.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// Best-effort event push; a gone channel means the peer went away
    /// and the watchdogs will clean up.
    pub async fn send(&self, event: OutboundEvent) {
        if self.outbound.send(event).await.is_err() {
            tracing::debug!(session_id = %self.session_id, "outbound channel closed");
        }
    }

    /// Serialize outbound response delivery for this call. Held across
    /// a whole response so concurrent triggers (a silence re-prompt
    /// against an in-flight reply) cannot interleave their events.
    pub async fn dispatch_guard(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().await
    }

    pub fn register_task(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    /// Abort the stream's background tasks
    pub fn abort_tasks(&self) {
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_provider::{SipProvider, TelephonyProvider};
    use call_agent_core::CallSession;

    async fn state(window_bytes: usize) -> (StreamState, mpsc::Receiver<OutboundEvent>) {
        let session = CallSession::new("+1555000", "+1555111", "sip", "leg-1", "en");
        let handler = SipProvider::new()
            .handle_incoming_call(&session)
            .await
            .unwrap();
        let (tx, rx) = mpsc::channel(16);
        (
            StreamState::new(
                session.id,
                VoiceAgentSettings::default(),
                handler,
                tx,
                window_bytes,
            ),
            rx,
        )
    }

    #[tokio::test]
    async fn test_window_fills_at_threshold() {
        let (state, _rx) = state(10).await;
        assert!(state.push_audio(&[0u8; 4]).is_none());
        assert!(state.push_audio(&[0u8; 4]).is_none());
        let window = state.push_audio(&[0u8; 4]).unwrap();
        assert_eq!(window.len(), 12);
        // Buffer drained after the flush.
        assert!(state.push_audio(&[0u8; 4]).is_none());
    }

    #[tokio::test]
    async fn test_interruption_requires_energy_jump() {
        let (state, _rx) = state(1024).await;
        let config = InterruptionConfig::default();

        // First chunk never interrupts (no previous energy).
        assert!(!state.detect_interruption(0.2, &config));
        // Small change: no.
        assert!(!state.detect_interruption(0.25, &config));
        // More than 2x jump over the floor: yes.
        assert!(state.detect_interruption(0.6, &config));
    }

    #[tokio::test]
    async fn test_quiet_jump_below_floor_ignored() {
        let (state, _rx) = state(1024).await;
        let config = InterruptionConfig::default();
        assert!(!state.detect_interruption(0.001, &config));
        // 5x jump, but still under the floor.
        assert!(!state.detect_interruption(0.005, &config));
    }

    #[tokio::test]
    async fn test_close_once() {
        let (state, _rx) = state(1024).await;
        assert!(state.close());
        assert!(!state.close());
        assert!(state.is_closed());
    }

    #[test]
    fn test_event_text_rendering() {
        let ack = OutboundEvent::Ack { sequence: 3 }.to_text().unwrap();
        assert!(ack.contains("\"type\":\"ack\""));
        assert!(ack.contains("\"sequence\":3"));

        let audio = OutboundEvent::Audio(AudioChunkFrame::agent(0, 0, vec![1u8]));
        assert!(audio.to_text().is_none());

        let hangup = OutboundEvent::Hangup {
            reason: "channel_closed".to_string(),
        }
        .to_text()
        .unwrap();
        assert!(hangup.contains("channel_closed"));
    }
}
