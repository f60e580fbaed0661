//! Call-control intent detection
//!
//! Regex patterns for the handful of intents the engine must act on
//! itself rather than hand to the reply generator. Ordering matters:
//! a goodbye beats everything, and an explicit request for a human
//! beats the playback adjustments.

use once_cell::sync::Lazy;
use regex::Regex;

/// Intents the engine handles directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallControlIntent {
    /// Caller is done and saying goodbye
    EndCall,
    /// Caller explicitly wants a human
    Transfer,
    /// Caller asked the agent to repeat itself
    Repeat,
    /// Caller asked the agent to speak up
    Louder,
    /// Caller asked the agent to slow down
    Slower,
}

impl CallControlIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallControlIntent::EndCall => "end_call",
            CallControlIntent::Transfer => "transfer",
            CallControlIntent::Repeat => "repeat",
            CallControlIntent::Louder => "louder",
            CallControlIntent::Slower => "slower",
        }
    }
}

static END_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(goodbye|bye|hang up|that'?s all|i'?m done|nothing else|no thanks?,? that'?s it)\b")
        .unwrap()
});

static TRANSFER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(speak|talk|connect)( me)?( to)?( with)? (a |an |the )?(human|person|agent|someone|representative|manager|operator)\b|\breal (person|human)\b",
    )
    .unwrap()
});

static REPEAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(say that again|repeat that|come again|pardon|what did you say|didn'?t catch that)\b")
        .unwrap()
});

static LOUDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(speak (up|louder)|can'?t hear( you)?|too quiet)\b").unwrap());

static SLOWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(slow down|speak (slower|more slowly)|too fast)\b").unwrap()
});

/// Scan `text` for a call-control intent, highest priority first.
pub fn detect_call_control(text: &str) -> Option<CallControlIntent> {
    if END_CALL.is_match(text) {
        Some(CallControlIntent::EndCall)
    } else if TRANSFER.is_match(text) {
        Some(CallControlIntent::Transfer)
    } else if REPEAT.is_match(text) {
        Some(CallControlIntent::Repeat)
    } else if LOUDER.is_match(text) {
        Some(CallControlIntent::Louder)
    } else if SLOWER.is_match(text) {
        Some(CallControlIntent::Slower)
    } else {
        None
    }
}
