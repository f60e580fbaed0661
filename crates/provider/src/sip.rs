//! Generic SIP adapter
//!
//! Covers self-hosted PBX deployments. Compared to Twilio this backend
//! has no recording and cannot dial out, so it leans on the trait
//! defaults for the unsupported surface.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

use call_agent_core::CallSession;

use crate::traits::{CallEvent, CallHandler, CallMetrics, ProviderFeatures, TelephonyProvider};
use crate::ProviderError;

/// SIP telephony backend
#[derive(Default)]
pub struct SipProvider;

impl SipProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TelephonyProvider for SipProvider {
    fn name(&self) -> &'static str {
        "sip"
    }

    fn supported_features(&self) -> ProviderFeatures {
        ProviderFeatures {
            real_time_audio: true,
            streaming_stt: false,
            streaming_tts: false,
            interrupt_handling: true,
            call_transfer: true,
            recording: false,
        }
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        tracing::info!("sip provider initialized");
        Ok(())
    }

    async fn handle_incoming_call(
        &self,
        session: &CallSession,
    ) -> Result<Arc<dyn CallHandler>, ProviderError> {
        tracing::info!(
            session_id = %session.id,
            call_ref = %session.provider_call_ref,
            "accepting inbound sip call"
        );
        Ok(Arc::new(SipCallHandler::new(&session.provider_call_ref)))
    }

    fn call_control_markup(&self, session: &CallSession, stream_url: &str) -> String {
        json!({
            "action": "connect_stream",
            "session_id": session.id,
            "stream_url": stream_url,
        })
        .to_string()
    }
}

/// Handler for one live SIP call
pub struct SipCallHandler {
    call_ref: String,
    metrics: Mutex<CallMetrics>,
    event_tx: Mutex<Option<mpsc::Sender<CallEvent>>>,
    hung_up: Mutex<bool>,
}

impl SipCallHandler {
    fn new(call_ref: &str) -> Self {
        Self {
            call_ref: call_ref.to_string(),
            metrics: Mutex::new(CallMetrics::default()),
            event_tx: Mutex::new(None),
            hung_up: Mutex::new(false),
        }
    }
}

#[async_trait]
impl CallHandler for SipCallHandler {
    fn call_ref(&self) -> &str {
        &self.call_ref
    }

    fn set_event_sender(&self, sender: mpsc::Sender<CallEvent>) {
        *self.event_tx.lock() = Some(sender);
    }

    fn audio_received(&self, data: &[u8]) {
        let mut metrics = self.metrics.lock();
        metrics.audio_bytes_received += data.len() as u64;
        metrics.chunks_received += 1;
    }

    async fn send_audio(&self, audio: &[u8]) -> Result<(), ProviderError> {
        if *self.hung_up.lock() {
            return Err(ProviderError::CallNotFound(self.call_ref.clone()));
        }
        self.metrics.lock().audio_bytes_sent += audio.len() as u64;
        tracing::trace!(call_ref = %self.call_ref, bytes = audio.len(), "audio queued to sip leg");
        Ok(())
    }

    async fn interrupt_audio(&self) -> Result<(), ProviderError> {
        self.metrics.lock().interruptions += 1;
        tracing::debug!(call_ref = %self.call_ref, "sip playback interrupted");
        Ok(())
    }

    async fn transfer_call(&self, target: &str) -> Result<(), ProviderError> {
        if *self.hung_up.lock() {
            return Err(ProviderError::Transfer("call already ended".to_string()));
        }
        tracing::info!(call_ref = %self.call_ref, target = %target, "sip REFER sent");
        *self.hung_up.lock() = true;
        Ok(())
    }

    async fn end_call(&self) -> Result<(), ProviderError> {
        let first = {
            let mut hung_up = self.hung_up.lock();
            let first = !*hung_up;
            *hung_up = true;
            first
        };
        if first {
            tracing::info!(call_ref = %self.call_ref, "sip call ended");
            let tx = self.event_tx.lock().clone();
            if let Some(tx) = tx {
                let _ = tx
                    .send(CallEvent::Disconnected {
                        reason: "hangup".to_string(),
                    })
                    .await;
            }
        }
        Ok(())
    }

    fn call_metrics(&self) -> CallMetrics {
        *self.metrics.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outbound_unsupported() {
        let provider = SipProvider::new();
        let err = provider
            .make_outbound_call("+1555222", "+1555000")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_markup_is_json() {
        let provider = SipProvider::new();
        let session = CallSession::new("+1555000", "+1555111", "sip", "leg-7", "en");
        let markup = provider.call_control_markup(&session, "wss://example.com/stream/x");

        let parsed: serde_json::Value = serde_json::from_str(&markup).unwrap();
        assert_eq!(parsed["action"], "connect_stream");
        assert_eq!(parsed["stream_url"], "wss://example.com/stream/x");
        assert_eq!(provider.markup_content_type(), "application/json");
    }

    #[tokio::test]
    async fn test_disconnect_event_on_hangup() {
        let provider = SipProvider::new();
        let session = CallSession::new("+1555000", "+1555111", "sip", "leg-7", "en");
        let handler = provider.handle_incoming_call(&session).await.unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        handler.set_event_sender(tx);
        handler.end_call().await.unwrap();

        match rx.recv().await {
            Some(CallEvent::Disconnected { reason }) => assert_eq!(reason, "hangup"),
            other => panic!("expected disconnect event, got {:?}", other),
        }
    }
}
