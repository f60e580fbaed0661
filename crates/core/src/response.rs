//! Response decisions
//!
//! The intelligence loop answers every customer turn with a
//! `VoiceResponse`: what to say, and whether the call continues, ends,
//! or escalates to a human.

use serde::{Deserialize, Serialize};

/// What the agent says next and what happens to the call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceResponse {
    /// Text to speak to the caller
    pub text: String,
    /// Pre-synthesized audio; when `None` the pipeline synthesizes `text`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Vec<u8>>,
    /// End the call after speaking
    pub should_end_call: bool,
    /// Transfer the call to a human after speaking
    pub should_transfer: bool,
    /// Machine-readable reason for ending or transferring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl VoiceResponse {
    /// A plain reply, call continues
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
            should_end_call: false,
            should_transfer: false,
            reason: None,
        }
    }

    /// Speak `text`, then end the call
    pub fn ending(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
            should_end_call: true,
            should_transfer: false,
            reason: Some(reason.into()),
        }
    }

    /// Speak `text`, then transfer to a human
    pub fn transfer(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
            should_end_call: false,
            should_transfer: true,
            reason: Some(reason.into()),
        }
    }

    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Whether this response terminates the call either way
    pub fn is_terminal(&self) -> bool {
        self.should_end_call || self.should_transfer
    }
}
