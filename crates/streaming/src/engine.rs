//! Stream orchestration
//!
//! `StreamEngine` glues one call's audio channel to the session registry,
//! its telephony provider, and the intelligence loop. Every terminal path
//! (goodbye, escalation, silence, watchdog, dropped channel) converges on
//! [`StreamEngine::finalize`], which is safe to reach more than once.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use call_agent_config::{InterruptionConfig, StreamingConfig};
use call_agent_core::{CallStatus, Speaker, Synthesizer, Transcriber, VoiceParams, VoiceResponse};
use call_agent_intelligence::IntelligenceEngine;
use call_agent_provider::ProviderManager;
use call_agent_session::{SessionRegistry, TransitionMetadata};

use crate::frame::{chunk_energy, AudioChunkFrame};
use crate::stream::{OutboundEvent, StreamState};
use crate::StreamingError;

/// Orchestrates all open audio streams
pub struct StreamEngine {
    streams: RwLock<HashMap<Uuid, Arc<StreamState>>>,
    registry: Arc<SessionRegistry>,
    providers: Arc<ProviderManager>,
    intelligence: Arc<IntelligenceEngine>,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    streaming: StreamingConfig,
    interruption: InterruptionConfig,
}

impl StreamEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<SessionRegistry>,
        providers: Arc<ProviderManager>,
        intelligence: Arc<IntelligenceEngine>,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
        streaming: StreamingConfig,
        interruption: InterruptionConfig,
    ) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            registry,
            providers,
            intelligence,
            transcriber,
            synthesizer,
            streaming,
            interruption,
        }
    }

    /// Open the audio stream for an accepted call.
    ///
    /// Moves the session to `Active`, speaks the greeting, and arms the
    /// call-duration watchdog. Events flow back through `outbound`.
    pub async fn open_stream(
        self: &Arc<Self>,
        session_id: Uuid,
        outbound: mpsc::Sender<OutboundEvent>,
    ) -> Result<Arc<StreamState>, StreamingError> {
        let session = self.registry.get_session(session_id).await?;
        if session.status.is_terminal() {
            return Err(StreamingError::SessionClosed(session_id));
        }
        if self.streams.read().contains_key(&session_id) {
            return Err(StreamingError::AlreadyStreaming(session_id));
        }

        let provider = self
            .providers
            .get(&session.provider)
            .ok_or_else(|| StreamingError::UnknownProvider(session.provider.clone()))?;
        let handler = provider.handle_incoming_call(&session).await?;
        let settings = self
            .registry
            .voice_agent_settings(&session.business_number)
            .await;

        // Audio is flowing; the call is live before anything can end it.
        if session.status == CallStatus::Ringing {
            self.registry
                .transition(session_id, CallStatus::Active, TransitionMetadata::default())
                .await?;
        }

        let stream = Arc::new(StreamState::new(
            session_id,
            settings.clone(),
            handler,
            outbound,
            self.streaming.window_bytes(),
        ));
        self.streams.write().insert(session_id, stream.clone());

        let greeting = self
            .intelligence
            .start_conversation(session_id, settings.clone())
            .await;
        self.dispatch_response(&stream, greeting).await;

        let engine = self.clone();
        let max_duration = Duration::from_secs(settings.max_call_duration_minutes as u64 * 60);
        stream.register_task(tokio::spawn(async move {
            tokio::time::sleep(max_duration).await;
            tracing::warn!(session_id = %session_id, "call hit the duration ceiling");
            engine
                .finalize(session_id, CallStatus::Ended, "max_duration_exceeded")
                .await;
        }));

        tracing::info!(session_id = %session_id, "audio stream opened");
        Ok(stream)
    }

    /// Ingest one inbound audio frame.
    pub async fn ingest_frame(
        &self,
        session_id: Uuid,
        frame: AudioChunkFrame,
    ) -> Result<(), StreamingError> {
        let stream = self.stream(session_id)?;
        if stream.is_closed() {
            return Ok(());
        }

        stream
            .send(OutboundEvent::Ack {
                sequence: frame.sequence,
            })
            .await;

        // Agent-tagged frames from the client side are a protocol
        // mistake; drop them after the ack.
        if frame.speaker != Speaker::Customer {
            tracing::warn!(
                session_id = %session_id,
                sequence = frame.sequence,
                "dropping inbound frame with agent speaker tag"
            );
            return Ok(());
        }

        stream.touch_audio();
        stream.handler.audio_received(&frame.payload);

        let energy = chunk_energy(&frame.payload);
        if stream.detect_interruption(energy, &self.interruption) {
            tracing::debug!(session_id = %session_id, energy = energy, "customer interruption");
            if let Err(err) = stream.handler.interrupt_audio().await {
                tracing::warn!(session_id = %session_id, error = %err, "interrupt delivery failed");
            }
            let _ = self.intelligence.handle_interruption(session_id).await;
            stream.send(OutboundEvent::Interrupted).await;
        }

        if let Some(window) = stream.push_audio(&frame.payload) {
            self.flush_window(&stream, window).await;
        }
        Ok(())
    }

    /// Transcribe a full audio window and run the conversation loop on
    /// the result.
    async fn flush_window(&self, stream: &Arc<StreamState>, window: Vec<u8>) {
        let language = &stream.settings.language;
        let transcription = match self.transcriber.transcribe(&window, language).await {
            Ok(transcription) => transcription,
            Err(err) => {
                // Lost window; the caller will repeat themselves.
                tracing::warn!(session_id = %stream.session_id, error = %err, "transcription failed");
                return;
            }
        };

        if !transcription.text.trim().is_empty() {
            stream
                .send(OutboundEvent::Transcript {
                    text: transcription.text.clone(),
                    is_final: !transcription.is_partial,
                })
                .await;
        }

        match self
            .intelligence
            .process_transcription(stream.session_id, &transcription)
            .await
        {
            Ok(Some(response)) => self.dispatch_response(stream, response).await,
            Ok(None) => {}
            Err(err) => {
                tracing::error!(session_id = %stream.session_id, error = %err, "conversation loop failed");
            }
        }
    }

    /// Speak a response and carry out its call-control decision.
    ///
    /// Responses for one call go out strictly one at a time; whoever
    /// holds the dispatch guard finishes text, audio, and call control
    /// before the next response starts.
    async fn dispatch_response(&self, stream: &Arc<StreamState>, response: VoiceResponse) {
        let _guard = stream.dispatch_guard().await;
        if stream.is_closed() {
            return;
        }

        stream
            .send(OutboundEvent::AgentText {
                text: response.text.clone(),
            })
            .await;

        let voice = self
            .intelligence
            .voice_params(stream.session_id)
            .await
            .unwrap_or_else(|_| VoiceParams::default());

        let audio = match response.audio {
            Some(audio) => Some(audio),
            None => match self.synthesizer.synthesize(&response.text, &voice).await {
                Ok(audio) => Some(audio),
                Err(err) => {
                    // Text telemetry still goes out; the call just loses
                    // this utterance's audio.
                    tracing::error!(
                        session_id = %stream.session_id,
                        error = %err,
                        "synthesis failed"
                    );
                    None
                }
            },
        };

        if let Some(audio) = audio {
            let frame =
                AudioChunkFrame::agent(stream.next_sequence(), stream.elapsed_ms(), audio.clone());
            stream.send(OutboundEvent::Audio(frame)).await;
            if let Err(err) = stream.handler.send_audio(&audio).await {
                tracing::warn!(session_id = %stream.session_id, error = %err, "provider playback failed");
            }
        }

        let reason = response.reason.as_deref().unwrap_or("agent_complete");
        if response.should_transfer {
            self.transfer(stream, reason).await;
        } else if response.should_end_call {
            self.finalize(stream.session_id, CallStatus::Ended, reason)
                .await;
        }
    }

    /// Hand the call to a human, or end it when no handoff target is
    /// configured.
    async fn transfer(&self, stream: &Arc<StreamState>, reason: &str) {
        let Some(target) = stream.settings.human_fallback_number.clone() else {
            tracing::warn!(
                session_id = %stream.session_id,
                reason = reason,
                "transfer requested but no fallback number configured"
            );
            self.finalize(stream.session_id, CallStatus::Ended, "transfer_failed")
                .await;
            return;
        };

        match stream.handler.transfer_call(&target).await {
            Ok(()) => {
                stream
                    .send(OutboundEvent::Transfer {
                        target: target.clone(),
                        reason: reason.to_string(),
                    })
                    .await;
                self.finalize_with_target(
                    stream.session_id,
                    CallStatus::Transferred,
                    reason,
                    Some(target),
                )
                .await;
            }
            Err(err) => {
                tracing::error!(session_id = %stream.session_id, error = %err, "transfer failed");
                self.finalize(stream.session_id, CallStatus::Ended, "transfer_failed")
                    .await;
            }
        }
    }

    /// The peer dropped the socket without a goodbye.
    pub async fn on_channel_closed(&self, session_id: Uuid) {
        if self.streams.read().contains_key(&session_id) {
            tracing::info!(session_id = %session_id, "audio channel closed by peer");
            self.finalize(session_id, CallStatus::Ended, "channel_closed")
                .await;
        }
    }

    /// Close a stream and settle the session. Every terminal path lands
    /// here; only the first arrival does any work.
    pub async fn finalize(&self, session_id: Uuid, status: CallStatus, reason: &str) {
        self.finalize_with_target(session_id, status, reason, None)
            .await;
    }

    async fn finalize_with_target(
        &self,
        session_id: Uuid,
        status: CallStatus,
        reason: &str,
        target: Option<String>,
    ) {
        let Some(stream) = self.streams.write().remove(&session_id) else {
            return;
        };
        if !stream.close() {
            return;
        }

        if let Err(err) = self.intelligence.save_conversation(session_id).await {
            tracing::error!(session_id = %session_id, error = %err, "conversation flush failed");
        }

        if status != CallStatus::Transferred {
            if let Err(err) = stream.handler.end_call().await {
                tracing::warn!(session_id = %session_id, error = %err, "provider hangup failed");
            }
        }

        let metadata = TransitionMetadata {
            reason: Some(reason.to_string()),
            target,
            detected_language: None,
        };
        match self.registry.transition(session_id, status, metadata).await {
            Ok(session) => {
                let metrics = stream.handler.call_metrics();
                tracing::info!(
                    session_id = %session_id,
                    status = status.as_str(),
                    reason = reason,
                    duration_seconds = session.duration_seconds().unwrap_or(0),
                    audio_bytes_received = metrics.audio_bytes_received,
                    interruptions = metrics.interruptions,
                    "call finalized"
                );
            }
            Err(err) => {
                // A race with another terminal path already settled the
                // session; the stream teardown above still applied.
                tracing::debug!(session_id = %session_id, error = %err, "finalize transition skipped");
            }
        }

        stream
            .send(OutboundEvent::Hangup {
                reason: reason.to_string(),
            })
            .await;

        // Last on purpose: a watchdog task can be the caller here, and
        // aborting it earlier would cancel the finalize work above.
        stream.abort_tasks();
    }

    /// Report how long each open stream has been quiet and act on it.
    /// One sweep; the monitor task calls this on an interval.
    pub async fn sweep_silence(&self) {
        let streams: Vec<Arc<StreamState>> = self.streams.read().values().cloned().collect();
        for stream in streams {
            if stream.is_closed() {
                continue;
            }
            let silent = stream.seconds_since_audio();
            match self
                .intelligence
                .handle_silence(
                    stream.session_id,
                    silent,
                    self.streaming.soft_silence_prompt_seconds,
                )
                .await
            {
                Ok(Some(response)) => self.dispatch_response(&stream, response).await,
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(session_id = %stream.session_id, error = %err, "silence check skipped");
                }
            }
        }
    }

    /// Start the background silence monitor. Flip the returned sender to
    /// `true` to stop it.
    pub fn start_silence_monitor(self: &Arc<Self>) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let engine = self.clone();
        let period = Duration::from_secs(self.streaming.silence_sweep_interval_seconds.max(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => engine.sweep_silence().await,
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("silence monitor stopped");
                            break;
                        }
                    }
                }
            }
        });

        (handle, shutdown_tx)
    }

    pub fn open_stream_count(&self) -> usize {
        self.streams.read().len()
    }

    fn stream(&self, session_id: Uuid) -> Result<Arc<StreamState>, StreamingError> {
        self.streams
            .read()
            .get(&session_id)
            .cloned()
            .ok_or(StreamingError::StreamNotFound(session_id))
    }
}
