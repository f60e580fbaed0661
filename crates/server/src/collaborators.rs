//! Built-in collaborator implementations
//!
//! Development and loopback-test stand-ins for the real speech and
//! generation services. Production deployments swap these out when
//! wiring [`crate::state::AppState`].

use async_trait::async_trait;

use call_agent_core::{
    CollaboratorError, ConversationTurn, GeneratedReply, ResponseGenerator, Synthesizer,
    Transcriber, Transcription, VoiceParams,
};

/// Treats the audio payload as UTF-8 text when it decodes cleanly.
///
/// Lets a loopback client drive the whole pipeline by sending text in
/// the audio frames. Real audio comes out as an empty, zero-confidence
/// transcription, which the conversation loop discards.
pub struct PassthroughTranscriber;

#[async_trait]
impl Transcriber for PassthroughTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        _language: &str,
    ) -> Result<Transcription, CollaboratorError> {
        match std::str::from_utf8(audio) {
            Ok(text) if text.trim_matches(char::from(0)).trim().is_empty() => Ok(Transcription {
                text: String::new(),
                confidence: 0.0,
                is_partial: false,
            }),
            Ok(text) => Ok(Transcription {
                text: text.trim_matches(char::from(0)).trim().to_string(),
                confidence: 0.92,
                is_partial: false,
            }),
            Err(_) => Ok(Transcription {
                text: String::new(),
                confidence: 0.0,
                is_partial: false,
            }),
        }
    }
}

/// Produces silence sized to the utterance; roughly 60ms of 16kHz PCM
/// per character, which is in the ballpark of spoken English.
pub struct SilenceSynthesizer;

const BYTES_PER_CHAR: usize = 1920;

#[async_trait]
impl Synthesizer for SilenceSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceParams,
    ) -> Result<Vec<u8>, CollaboratorError> {
        let rate = voice.speaking_rate.clamp(0.5, 2.0);
        let len = (text.chars().count() * BYTES_PER_CHAR) as f32 / rate;
        Ok(vec![0u8; (len as usize).max(BYTES_PER_CHAR)])
    }
}

/// Keyword FAQ responder.
pub struct RuleBasedResponder;

#[async_trait]
impl ResponseGenerator for RuleBasedResponder {
    async fn generate_reply(
        &self,
        _history: &[ConversationTurn],
        text: &str,
        _language: &str,
    ) -> Result<GeneratedReply, CollaboratorError> {
        let lowered = text.to_lowercase();

        let (reply, intent, confidence) = if lowered.contains("hour") || lowered.contains("open") {
            (
                "We're open Monday through Friday, nine to six.",
                "business_hours",
                0.9,
            )
        } else if lowered.contains("where") || lowered.contains("address") || lowered.contains("location") {
            (
                "You can find us at our main location downtown. I can text you the address if you like.",
                "location",
                0.85,
            )
        } else if lowered.contains("price") || lowered.contains("cost") || lowered.contains("how much") {
            (
                "Pricing depends on what you need. Could you tell me a bit more about what you're looking for?",
                "pricing",
                0.8,
            )
        } else {
            (
                "I can help with questions about hours, location, and pricing. What would you like to know?",
                "fallback",
                0.5,
            )
        };

        Ok(GeneratedReply {
            text: reply.to_string(),
            confidence,
            intent: Some(intent.to_string()),
            should_end_call: false,
        })
    }
}
