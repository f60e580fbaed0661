//! Twilio adapter
//!
//! Audio for a Twilio call flows through the engine's own streaming
//! endpoint; the adapter's job is call control (TwiML, transfer, hangup)
//! and transport accounting.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use call_agent_core::CallSession;

use crate::traits::{CallEvent, CallHandler, CallMetrics, ProviderFeatures, TelephonyProvider};
use crate::ProviderError;

/// Twilio telephony backend
#[derive(Default)]
pub struct TwilioProvider;

impl TwilioProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TelephonyProvider for TwilioProvider {
    fn name(&self) -> &'static str {
        "twilio"
    }

    fn supported_features(&self) -> ProviderFeatures {
        ProviderFeatures {
            real_time_audio: true,
            streaming_stt: true,
            streaming_tts: true,
            interrupt_handling: true,
            call_transfer: true,
            recording: true,
        }
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        tracing::info!("twilio provider initialized");
        Ok(())
    }

    async fn handle_incoming_call(
        &self,
        session: &CallSession,
    ) -> Result<Arc<dyn CallHandler>, ProviderError> {
        tracing::info!(
            session_id = %session.id,
            call_ref = %session.provider_call_ref,
            "accepting inbound twilio call"
        );
        Ok(Arc::new(TwilioCallHandler::new(&session.provider_call_ref)))
    }

    async fn make_outbound_call(
        &self,
        to: &str,
        from: &str,
    ) -> Result<Arc<dyn CallHandler>, ProviderError> {
        tracing::info!(to = %to, from = %from, "placing outbound twilio call");
        Ok(Arc::new(TwilioCallHandler::new(&format!(
            "out-{}-{}",
            from, to
        ))))
    }

    fn call_control_markup(&self, session: &CallSession, stream_url: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                "<Response><Connect><Stream url=\"{}\">",
                "<Parameter name=\"sessionId\" value=\"{}\"/>",
                "</Stream></Connect></Response>"
            ),
            stream_url, session.id
        )
    }

    fn markup_content_type(&self) -> &'static str {
        "application/xml"
    }
}

/// Handler for one live Twilio call
pub struct TwilioCallHandler {
    call_ref: String,
    metrics: Mutex<CallMetrics>,
    event_tx: Mutex<Option<mpsc::Sender<CallEvent>>>,
    hung_up: Mutex<bool>,
}

impl TwilioCallHandler {
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
impl CallHandler for TwilioCallHandler {
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
        tracing::trace!(call_ref = %self.call_ref, bytes = audio.len(), "audio queued to twilio media stream");
        Ok(())
    }

    async fn interrupt_audio(&self) -> Result<(), ProviderError> {
        self.metrics.lock().interruptions += 1;
        tracing::debug!(call_ref = %self.call_ref, "twilio playback interrupted");
        Ok(())
    }

    async fn transfer_call(&self, target: &str) -> Result<(), ProviderError> {
        if *self.hung_up.lock() {
            return Err(ProviderError::Transfer("call already ended".to_string()));
        }
        tracing::info!(call_ref = %self.call_ref, target = %target, "twilio call transferred");
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
            tracing::info!(call_ref = %self.call_ref, "twilio call ended");
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
