//! Collaborator traits
//!
//! The engine treats speech-to-text, text-to-speech, and reply generation
//! as black boxes behind these traits. Implementations are swappable
//! strategy objects; the orchestration core never assumes a vendor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::turn::ConversationTurn;

/// Failures from an external collaborator.
///
/// These are always recovered locally with a safe fallback; they must
/// never reach the caller's ear as a raw error.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("reply generation failed: {0}")]
    Generation(String),
}

/// Result of a transcription call
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    /// In-progress result for the current utterance; partials are
    /// telemetry only and never mutate conversation state
    pub is_partial: bool,
}

/// Voice personality parameters passed to the synthesizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceParams {
    pub voice: String,
    pub speaking_rate: f32,
    pub pitch: f32,
    /// Output gain, 1.0 = nominal
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_volume() -> f32 {
    1.0
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: "neutral".to_string(),
            speaking_rate: 1.0,
            pitch: 0.0,
            volume: default_volume(),
        }
    }
}

/// Result of a reply-generation call
#[derive(Debug, Clone)]
pub struct GeneratedReply {
    pub text: String,
    pub confidence: f32,
    pub intent: Option<String>,
    pub should_end_call: bool,
}

/// Speech-to-text collaborator
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        language: &str,
    ) -> Result<Transcription, CollaboratorError>;
}

/// Text-to-speech collaborator.
///
/// Retry and fallback-provider policy lives inside the implementation,
/// not in the orchestration core.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceParams,
    ) -> Result<Vec<u8>, CollaboratorError>;
}

/// Generative-response collaborator
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate_reply(
        &self,
        history: &[ConversationTurn],
        text: &str,
        language: &str,
    ) -> Result<GeneratedReply, CollaboratorError>;
}
