//! End-to-end conversation loop tests with a scripted reply generator.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use call_agent_config::{EscalationWeights, VoiceAgentSettings};
use call_agent_core::{
    CollaboratorError, ConversationTurn, GeneratedReply, ResponseGenerator, Speaker,
    Transcription,
};
use call_agent_intelligence::IntelligenceEngine;
use call_agent_storage::{ConversationStore, MemoryConversationStore};

/// Generator that echoes the question back, optionally failing.
struct ScriptedGenerator {
    failing: AtomicBool,
}

impl ScriptedGenerator {
    fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ResponseGenerator for ScriptedGenerator {
    async fn generate_reply(
        &self,
        _history: &[ConversationTurn],
        text: &str,
        _language: &str,
    ) -> Result<GeneratedReply, CollaboratorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Generation("model unavailable".to_string()));
        }
        Ok(GeneratedReply {
            text: format!("You asked: {}", text),
            confidence: 0.9,
            intent: Some("faq".to_string()),
            should_end_call: false,
        })
    }
}

fn final_transcription(text: &str, confidence: f32) -> Transcription {
    Transcription {
        text: text.to_string(),
        confidence,
        is_partial: false,
    }
}

fn build_engine() -> (Arc<IntelligenceEngine>, Arc<MemoryConversationStore>, Arc<ScriptedGenerator>)
{
    let generator = Arc::new(ScriptedGenerator::new());
    let store = Arc::new(MemoryConversationStore::new());
    let engine = Arc::new(IntelligenceEngine::new(
        generator.clone(),
        store.clone(),
        EscalationWeights::default(),
    ));
    (engine, store, generator)
}

#[tokio::test]
async fn test_happy_path_question_and_goodbye() {
    let (engine, store, _) = build_engine();
    let session_id = Uuid::new_v4();

    let greeting = engine
        .start_conversation(session_id, VoiceAgentSettings::default())
        .await;
    assert!(!greeting.is_terminal());

    let reply = engine
        .process_transcription(session_id, &final_transcription("what are your hours?", 0.95))
        .await
        .unwrap()
        .unwrap();
    assert!(reply.text.contains("what are your hours?"));
    assert!(!reply.is_terminal());

    let goodbye = engine
        .process_transcription(session_id, &final_transcription("great, thanks, bye", 0.95))
        .await
        .unwrap()
        .unwrap();
    assert!(goodbye.should_end_call);
    assert_eq!(goodbye.reason.as_deref(), Some("customer_request"));

    let saved = engine.save_conversation(session_id).await.unwrap();
    assert!(saved >= 4);
    let turns = store.load_turns(session_id).await.unwrap();
    assert_eq!(turns.len(), saved);
    assert_eq!(turns[0].speaker, Speaker::Agent);
}

#[tokio::test]
async fn test_partial_transcriptions_do_not_advance_conversation() {
    let (engine, _, _) = build_engine();
    let session_id = Uuid::new_v4();
    engine
        .start_conversation(session_id, VoiceAgentSettings::default())
        .await;

    let partial = Transcription {
        text: "what are yo".to_string(),
        confidence: 0.5,
        is_partial: true,
    };
    let result = engine
        .process_transcription(session_id, &partial)
        .await
        .unwrap();
    assert!(result.is_none());

    // Only the greeting is on record.
    assert_eq!(engine.history(session_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_human_request_transfers() {
    let (engine, _, _) = build_engine();
    let session_id = Uuid::new_v4();
    engine
        .start_conversation(session_id, VoiceAgentSettings::default())
        .await;

    let response = engine
        .process_transcription(
            session_id,
            &final_transcription("I'd like to speak to a human", 0.95),
        )
        .await
        .unwrap()
        .unwrap();
    assert!(response.should_transfer);
    assert_eq!(response.reason.as_deref(), Some("customer_request"));
}

#[tokio::test]
async fn test_frustrated_low_confidence_call_escalates() {
    let (engine, _, _) = build_engine();
    let session_id = Uuid::new_v4();
    engine
        .start_conversation(session_id, VoiceAgentSettings::default())
        .await;

    // Two garbled turns, then a clearly negative one. The third turn
    // trips both the repeated-low-confidence and the sentiment signal.
    for (text, confidence) in [("mumble mumble", 0.4), ("static noise", 0.5)] {
        let response = engine
            .process_transcription(session_id, &final_transcription(text, confidence))
            .await
            .unwrap()
            .unwrap();
        assert!(!response.is_terminal());
    }

    let response = engine
        .process_transcription(
            session_id,
            &final_transcription("this is terrible and useless", 0.55),
        )
        .await
        .unwrap()
        .unwrap();
    assert!(response.should_transfer);
    assert_eq!(response.reason.as_deref(), Some("negative_sentiment"));
}

#[tokio::test]
async fn test_generator_failure_degrades_to_handoff() {
    let (engine, _, generator) = build_engine();
    let session_id = Uuid::new_v4();
    engine
        .start_conversation(session_id, VoiceAgentSettings::default())
        .await;

    generator.failing.store(true, Ordering::SeqCst);
    let response = engine
        .process_transcription(session_id, &final_transcription("are you open today?", 0.95))
        .await
        .unwrap()
        .unwrap();
    assert!(response.should_transfer);
    assert_eq!(response.reason.as_deref(), Some("ai_error"));
}

#[tokio::test]
async fn test_silence_soft_prompt_then_timeout() {
    let (engine, _, _) = build_engine();
    let session_id = Uuid::new_v4();
    engine
        .start_conversation(session_id, VoiceAgentSettings::default())
        .await;

    // Below the soft threshold: nothing.
    assert!(engine
        .handle_silence(session_id, 5.0, 10.0)
        .await
        .unwrap()
        .is_none());

    // Past the soft threshold: one re-prompt, then quiet.
    let reprompt = engine
        .handle_silence(session_id, 12.0, 10.0)
        .await
        .unwrap()
        .unwrap();
    assert!(!reprompt.is_terminal());
    assert!(engine
        .handle_silence(session_id, 14.0, 10.0)
        .await
        .unwrap()
        .is_none());

    // Past the hard timeout: hand off.
    let timeout = engine
        .handle_silence(session_id, 31.0, 10.0)
        .await
        .unwrap()
        .unwrap();
    assert!(timeout.should_transfer);
    assert_eq!(timeout.reason.as_deref(), Some("silence_timeout"));
}

#[tokio::test]
async fn test_interruption_flags_latest_agent_turn() {
    let (engine, _, _) = build_engine();
    let session_id = Uuid::new_v4();
    engine
        .start_conversation(session_id, VoiceAgentSettings::default())
        .await;

    engine.handle_interruption(session_id).await.unwrap();
    let turns = engine.history(session_id).await.unwrap();
    assert!(turns[0].interrupted);
}

#[tokio::test]
async fn test_save_is_idempotent() {
    let (engine, store, _) = build_engine();
    let session_id = Uuid::new_v4();
    engine
        .start_conversation(session_id, VoiceAgentSettings::default())
        .await;

    let first = engine.save_conversation(session_id).await.unwrap();
    assert_eq!(first, 1);
    // Second flush is a no-op, not a duplicate batch.
    let second = engine.save_conversation(session_id).await.unwrap();
    assert_eq!(second, 0);
    assert_eq!(store.load_turns(session_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_garbled_goodbye_escalates_instead_of_hanging_up() {
    let (engine, _, _) = build_engine();
    let session_id = Uuid::new_v4();
    engine
        .start_conversation(session_id, VoiceAgentSettings::default())
        .await;

    // Barely-understood goodbye. Below the low-confidence trigger the
    // call must reach a human, not hang up on a guess.
    let response = engine
        .process_transcription(session_id, &final_transcription("bye", 0.2))
        .await
        .unwrap()
        .unwrap();
    assert!(response.should_transfer);
    assert!(!response.should_end_call);
    assert_eq!(response.reason.as_deref(), Some("low_confidence"));
}

#[tokio::test]
async fn test_louder_request_raises_volume() {
    let (engine, _, _) = build_engine();
    let session_id = Uuid::new_v4();
    engine
        .start_conversation(session_id, VoiceAgentSettings::default())
        .await;

    let before = engine.voice_params(session_id).await.unwrap().volume;
    let response = engine
        .process_transcription(
            session_id,
            &final_transcription("can you speak up please?", 0.95),
        )
        .await
        .unwrap()
        .unwrap();
    // Conversation continues with a louder voice.
    assert!(!response.is_terminal());
    let after = engine.voice_params(session_id).await.unwrap().volume;
    assert!(after > before);
}

#[tokio::test]
async fn test_repeat_request_replays_last_agent_line() {
    let (engine, _, _) = build_engine();
    let session_id = Uuid::new_v4();
    let settings = VoiceAgentSettings::default();
    let welcome = settings.welcome_message.clone();
    engine.start_conversation(session_id, settings).await;

    let response = engine
        .process_transcription(session_id, &final_transcription("sorry, say that again?", 0.95))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.text, welcome);
    assert!(!response.is_terminal());
}
