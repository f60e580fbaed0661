//! Provider traits
//!
//! Abstract interfaces for telephony backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use call_agent_core::CallSession;

use crate::ProviderError;

/// Capabilities a provider may or may not support
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProviderFeatures {
    pub real_time_audio: bool,
    pub streaming_stt: bool,
    pub streaming_tts: bool,
    pub interrupt_handling: bool,
    pub call_transfer: bool,
    pub recording: bool,
}

/// Per-call transport counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CallMetrics {
    pub audio_bytes_sent: u64,
    pub audio_bytes_received: u64,
    pub chunks_received: u64,
    pub interruptions: u64,
}

/// Events a call handler surfaces to the engine
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// Raw audio received from the provider side
    AudioChunk { data: Vec<u8>, timestamp_ms: u64 },
    /// Provider-side transcription, where the backend supplies one
    Transcription { text: String, is_final: bool },
    /// The provider dropped the call
    Disconnected { reason: String },
}

/// Handle for one live call on a specific provider
#[async_trait]
pub trait CallHandler: Send + Sync {
    /// Provider-native call reference
    fn call_ref(&self) -> &str;

    /// Register the sender that receives this call's events
    fn set_event_sender(&self, sender: mpsc::Sender<CallEvent>);

    /// Record audio arriving from the caller (drives metrics and any
    /// provider-side bookkeeping)
    fn audio_received(&self, data: &[u8]);

    /// Play audio to the caller. Some providers require this path even
    /// when the engine also writes to the raw channel.
    async fn send_audio(&self, audio: &[u8]) -> Result<(), ProviderError>;

    /// Stop any audio currently playing to the caller
    async fn interrupt_audio(&self) -> Result<(), ProviderError>;

    /// Transfer the call to a human
    async fn transfer_call(&self, target: &str) -> Result<(), ProviderError>;

    /// Hang up
    async fn end_call(&self) -> Result<(), ProviderError>;

    fn call_metrics(&self) -> CallMetrics;
}

/// A telephony backend
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Registry key, e.g. "twilio" or "sip"
    fn name(&self) -> &'static str;

    fn supported_features(&self) -> ProviderFeatures;

    async fn initialize(&self) -> Result<(), ProviderError>;

    /// Accept an inbound call and return its handler
    async fn handle_incoming_call(
        &self,
        session: &CallSession,
    ) -> Result<Arc<dyn CallHandler>, ProviderError>;

    /// Place an outbound call. Providers that cannot dial out keep this
    /// default, which reports the missing capability instead of crashing.
    async fn make_outbound_call(
        &self,
        _to: &str,
        _from: &str,
    ) -> Result<Arc<dyn CallHandler>, ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "{} does not support outbound calls",
            self.name()
        )))
    }

    /// Call-control markup returned from the inbound webhook, directing
    /// the provider to open a bidirectional audio connection to
    /// `stream_url`.
    fn call_control_markup(&self, session: &CallSession, stream_url: &str) -> String;

    /// Content type of the markup above
    fn markup_content_type(&self) -> &'static str {
        "application/json"
    }
}
