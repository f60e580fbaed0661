//! Per-number voice agent settings
//!
//! Configured externally per business phone number and read-only to the
//! engine. The pipeline takes one snapshot when a call starts; mutating
//! settings mid-call is not supported.

use call_agent_core::VoiceParams;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Escalation-trigger thresholds for one business number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationTriggers {
    /// Silence duration that forces a transfer, in seconds
    #[serde(default = "default_silence_timeout")]
    pub silence_timeout_seconds: f32,

    /// Minimum combined lexicon score for a non-neutral sentiment call
    #[serde(default = "default_negative_sentiment_threshold")]
    pub negative_sentiment_threshold: f32,

    /// Transcription confidence below which a turn escalates directly
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f32,

    /// Escalate immediately on abusive language
    #[serde(default = "default_true")]
    pub abusive_language: bool,
}

fn default_silence_timeout() -> f32 {
    30.0
}
fn default_negative_sentiment_threshold() -> f32 {
    0.3
}
fn default_low_confidence_threshold() -> f32 {
    0.3
}
fn default_true() -> bool {
    true
}

impl Default for EscalationTriggers {
    fn default() -> Self {
        Self {
            silence_timeout_seconds: default_silence_timeout(),
            negative_sentiment_threshold: default_negative_sentiment_threshold(),
            low_confidence_threshold: default_low_confidence_threshold(),
            abusive_language: default_true(),
        }
    }
}

/// Weekly availability window.
///
/// Hours are in UTC. `days` uses 0 = Monday through 6 = Sunday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_open_hour")]
    pub open_hour: u8,
    #[serde(default = "default_close_hour")]
    pub close_hour: u8,
    #[serde(default = "default_days")]
    pub days: Vec<u8>,
}

fn default_open_hour() -> u8 {
    9
}
fn default_close_hour() -> u8 {
    18
}
fn default_days() -> Vec<u8> {
    vec![0, 1, 2, 3, 4]
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            enabled: false,
            open_hour: default_open_hour(),
            close_hour: default_close_hour(),
            days: default_days(),
        }
    }
}

impl BusinessHours {
    /// Whether the agent takes calls at `now`. Always true when the
    /// hours table is disabled.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return true;
        }
        let day = now.weekday().num_days_from_monday() as u8;
        if !self.days.contains(&day) {
            return false;
        }
        let hour = now.hour() as u8;
        hour >= self.open_hour && hour < self.close_hour
    }
}

/// Voice agent configuration for one business phone number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceAgentSettings {
    /// Whether the agent answers calls at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub business_hours: BusinessHours,

    /// Hard ceiling on call length, enforced by the per-call watchdog
    #[serde(default = "default_max_call_duration")]
    pub max_call_duration_minutes: u32,

    /// Number a transfer goes to; a transfer without one degrades to
    /// ending the call with reason `transfer_failed`
    #[serde(default)]
    pub human_fallback_number: Option<String>,

    /// Voice personality passed to the synthesizer
    #[serde(default)]
    pub voice: VoiceParams,

    /// Spoken-language tag for this number
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub triggers: EscalationTriggers,

    #[serde(default = "default_welcome")]
    pub welcome_message: String,

    #[serde(default = "default_goodbye")]
    pub goodbye_message: String,

    /// Gentle re-prompt after the soft silence threshold
    #[serde(default = "default_reprompt")]
    pub reprompt_message: String,

    /// Spoken before handing off to a human
    #[serde(default = "default_handoff")]
    pub handoff_message: String,

    /// Spoken when an internal failure forces a handoff
    #[serde(default = "default_apology")]
    pub apology_message: String,
}

fn default_max_call_duration() -> u32 {
    15
}
fn default_language() -> String {
    "en".to_string()
}
fn default_welcome() -> String {
    "Hello! You've reached our automated assistant. How can I help you today?".to_string()
}
fn default_goodbye() -> String {
    "Thank you for calling. Goodbye!".to_string()
}
fn default_reprompt() -> String {
    "Are you still there? I'm happy to help if you have any questions.".to_string()
}
fn default_handoff() -> String {
    "Let me connect you with one of our team members. One moment please.".to_string()
}
fn default_apology() -> String {
    "I'm sorry, I'm having trouble understanding right now. Let me connect you with a person who can help.".to_string()
}

impl Default for VoiceAgentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            business_hours: BusinessHours::default(),
            max_call_duration_minutes: default_max_call_duration(),
            human_fallback_number: None,
            voice: VoiceParams::default(),
            language: default_language(),
            triggers: EscalationTriggers::default(),
            welcome_message: default_welcome(),
            goodbye_message: default_goodbye(),
            reprompt_message: default_reprompt(),
            handoff_message: default_handoff(),
            apology_message: default_apology(),
        }
    }
}
