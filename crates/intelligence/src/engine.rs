//! Conversation loop
//!
//! One `IntelligenceEngine` serves every call. Per-call state lives in a
//! `ConversationContext` behind an async mutex, so turns within a call
//! are processed strictly in order while calls never block each other.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use call_agent_config::{EscalationWeights, VoiceAgentSettings};
use call_agent_core::{
    ConversationTurn, ResponseGenerator, Transcription, VoiceParams, VoiceResponse,
};
use call_agent_storage::ConversationStore;

use crate::context::ConversationContext;
use crate::escalation::{escalation_score, should_escalate};
use crate::intent::{detect_call_control, CallControlIntent};
use crate::sentiment::SentimentAnalyzer;
use crate::IntelligenceError;

/// Drives the conversation for every active call
pub struct IntelligenceEngine {
    contexts: RwLock<HashMap<Uuid, Arc<Mutex<ConversationContext>>>>,
    generator: Arc<dyn ResponseGenerator>,
    store: Arc<dyn ConversationStore>,
    weights: EscalationWeights,
    analyzer: SentimentAnalyzer,
}

impl IntelligenceEngine {
    pub fn new(
        generator: Arc<dyn ResponseGenerator>,
        store: Arc<dyn ConversationStore>,
        weights: EscalationWeights,
    ) -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            generator,
            store,
            weights,
            analyzer: SentimentAnalyzer::new(),
        }
    }

    /// Open a conversation and return the greeting.
    pub async fn start_conversation(
        &self,
        session_id: Uuid,
        settings: VoiceAgentSettings,
    ) -> VoiceResponse {
        let welcome = settings.welcome_message.clone();
        let mut context = ConversationContext::new(session_id, settings);
        context.push_agent_turn(ConversationTurn::agent(&welcome).with_intent("greeting"));

        self.contexts
            .write()
            .insert(session_id, Arc::new(Mutex::new(context)));

        tracing::info!(session_id = %session_id, "conversation started");
        VoiceResponse::reply(welcome)
    }

    /// Process one transcription and decide the agent's next move.
    ///
    /// Partial transcriptions are telemetry only and return `Ok(None)`
    /// without touching conversation state.
    pub async fn process_transcription(
        &self,
        session_id: Uuid,
        transcription: &Transcription,
    ) -> Result<Option<VoiceResponse>, IntelligenceError> {
        if transcription.is_partial || transcription.text.trim().is_empty() {
            return Ok(None);
        }

        let entry = self.context(session_id)?;
        let mut context = entry.lock().await;

        let text = transcription.text.trim();
        let triggers = context.settings.triggers.clone();
        let score = self
            .analyzer
            .analyze(text, triggers.negative_sentiment_threshold);
        let intent = detect_call_control(text);

        let mut turn = ConversationTurn::customer(text, transcription.confidence)
            .with_sentiment(score.sentiment);
        if let Some(intent) = intent {
            turn = turn.with_intent(intent.as_str());
        }
        context.push_customer_turn(turn);

        if score.abusive && triggers.abusive_language {
            tracing::warn!(session_id = %session_id, "abusive language detected");
            let handoff = context.settings.handoff_message.clone();
            context.push_agent_turn(ConversationTurn::agent(&handoff).with_intent("handoff"));
            return Ok(Some(VoiceResponse::transfer(handoff, "abusive_language")));
        }

        // Escalation outranks call control: a goodbye the agent barely
        // understood must reach a human, not hang up on the customer.
        let escalation = escalation_score(
            &self.weights,
            &triggers,
            context.turns(),
            transcription.confidence,
            score.sentiment,
        );
        if let Some(reason) = should_escalate(
            &self.weights,
            &triggers,
            escalation,
            transcription.confidence,
            score.sentiment,
        ) {
            tracing::info!(
                session_id = %session_id,
                score = escalation,
                reason = reason,
                "escalation triggered"
            );
            let handoff = context.settings.handoff_message.clone();
            context.push_agent_turn(ConversationTurn::agent(&handoff).with_intent("handoff"));
            return Ok(Some(VoiceResponse::transfer(handoff, reason)));
        }

        match intent {
            Some(CallControlIntent::EndCall) => {
                let goodbye = context.settings.goodbye_message.clone();
                context.push_agent_turn(ConversationTurn::agent(&goodbye).with_intent("goodbye"));
                return Ok(Some(VoiceResponse::ending(goodbye, "customer_request")));
            }
            Some(CallControlIntent::Transfer) => {
                let handoff = context.settings.handoff_message.clone();
                context.push_agent_turn(ConversationTurn::agent(&handoff).with_intent("handoff"));
                return Ok(Some(VoiceResponse::transfer(handoff, "customer_request")));
            }
            Some(CallControlIntent::Repeat) => {
                let reply = context
                    .last_agent_text()
                    .map(str::to_owned)
                    .unwrap_or_else(|| context.settings.reprompt_message.clone());
                context.push_agent_turn(ConversationTurn::agent(&reply).with_intent("repeat"));
                return Ok(Some(VoiceResponse::reply(reply)));
            }
            Some(CallControlIntent::Slower) => {
                context.slow_down();
            }
            Some(CallControlIntent::Louder) => {
                context.speak_up();
            }
            None => {}
        }

        let language = context.settings.language.clone();
        match self
            .generator
            .generate_reply(context.turns(), text, &language)
            .await
        {
            Ok(reply) => {
                let mut agent_turn = ConversationTurn::agent(&reply.text);
                agent_turn.confidence = Some(reply.confidence);
                if let Some(intent) = &reply.intent {
                    agent_turn = agent_turn.with_intent(intent.clone());
                }
                context.push_agent_turn(agent_turn);

                if reply.should_end_call {
                    Ok(Some(VoiceResponse::ending(reply.text, "agent_complete")))
                } else {
                    Ok(Some(VoiceResponse::reply(reply.text)))
                }
            }
            Err(err) => {
                // The caller never hears a raw failure; apologize and
                // hand off.
                tracing::error!(session_id = %session_id, error = %err, "reply generation failed");
                let apology = context.settings.apology_message.clone();
                context.push_agent_turn(ConversationTurn::agent(&apology).with_intent("handoff"));
                Ok(Some(VoiceResponse::transfer(apology, "ai_error")))
            }
        }
    }

    /// React to a silence report from the streaming side.
    ///
    /// Past the hard timeout the call hands off; past the soft threshold
    /// the agent re-prompts once per lull.
    pub async fn handle_silence(
        &self,
        session_id: Uuid,
        silent_seconds: f32,
        soft_threshold_seconds: f32,
    ) -> Result<Option<VoiceResponse>, IntelligenceError> {
        let entry = self.context(session_id)?;
        let mut context = entry.lock().await;

        if silent_seconds >= context.settings.triggers.silence_timeout_seconds {
            tracing::info!(
                session_id = %session_id,
                silent_seconds = silent_seconds,
                "silence timeout reached"
            );
            let handoff = context.settings.handoff_message.clone();
            context.push_agent_turn(ConversationTurn::agent(&handoff).with_intent("handoff"));
            return Ok(Some(VoiceResponse::transfer(handoff, "silence_timeout")));
        }

        if silent_seconds >= soft_threshold_seconds && context.take_reprompt_slot() {
            let reprompt = context.settings.reprompt_message.clone();
            context.push_agent_turn(ConversationTurn::agent(&reprompt).with_intent("reprompt"));
            return Ok(Some(VoiceResponse::reply(reprompt)));
        }

        Ok(None)
    }

    /// Record that the customer spoke over the agent's playback
    pub async fn handle_interruption(&self, session_id: Uuid) -> Result<(), IntelligenceError> {
        let entry = self.context(session_id)?;
        entry.lock().await.mark_last_agent_interrupted();
        tracing::debug!(session_id = %session_id, "agent turn marked interrupted");
        Ok(())
    }

    /// Voice parameters for synthesis, including mid-call adjustments
    pub async fn voice_params(&self, session_id: Uuid) -> Result<VoiceParams, IntelligenceError> {
        let entry = self.context(session_id)?;
        let context = entry.lock().await;
        Ok(context.voice().clone())
    }

    /// Flush the conversation to the store and drop the context.
    ///
    /// Safe to call more than once: after the first flush the context is
    /// gone and subsequent calls are no-ops.
    pub async fn save_conversation(&self, session_id: Uuid) -> Result<usize, IntelligenceError> {
        let entry = match self.contexts.read().get(&session_id) {
            Some(entry) => entry.clone(),
            None => return Ok(0),
        };

        let turns = entry.lock().await.turns().to_vec();
        self.store.save_turns(session_id, &turns).await?;
        self.contexts.write().remove(&session_id);

        tracing::info!(session_id = %session_id, turns = turns.len(), "conversation saved");
        Ok(turns.len())
    }

    /// Current turn history, for inspection endpoints
    pub async fn history(&self, session_id: Uuid) -> Option<Vec<ConversationTurn>> {
        let entry = self.contexts.read().get(&session_id)?.clone();
        let context = entry.lock().await;
        Some(context.turns().to_vec())
    }

    fn context(
        &self,
        session_id: Uuid,
    ) -> Result<Arc<Mutex<ConversationContext>>, IntelligenceError> {
        self.contexts
            .read()
            .get(&session_id)
            .cloned()
            .ok_or(IntelligenceError::UnknownSession(session_id))
    }
}
