//! Conversation turns
//!
//! A turn is one utterance by either party within a call. Turns are
//! append-only; the only allowed post-hoc mutation is flagging an agent
//! turn as interrupted when the next customer audio arrives mid-synthesis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Customer,
    Agent,
}

/// Sentiment classification of a customer utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn is_negative(&self) -> bool {
        matches!(self, Sentiment::Negative)
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Sentiment::Positive)
    }

    /// Polarity score (-1.0 to 1.0)
    pub fn polarity(&self) -> f32 {
        match self {
            Sentiment::Positive => 0.5,
            Sentiment::Neutral => 0.0,
            Sentiment::Negative => -0.5,
        }
    }
}

/// One utterance within a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Turn ID
    pub id: Uuid,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
    /// Who spoke
    pub speaker: Speaker,
    /// What was said
    pub text: String,
    /// Detected intent, if any
    pub intent: Option<String>,
    /// Classified sentiment, if any
    pub sentiment: Option<Sentiment>,
    /// Transcription or generation confidence, if known
    pub confidence: Option<f32>,
    /// Set on an agent turn when the customer spoke over it
    pub interrupted: bool,
}

impl ConversationTurn {
    /// Create a customer turn
    pub fn customer(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            speaker: Speaker::Customer,
            text: text.into(),
            intent: None,
            sentiment: None,
            confidence: Some(confidence),
            interrupted: false,
        }
    }

    /// Create an agent turn
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            speaker: Speaker::Agent,
            text: text.into(),
            intent: None,
            sentiment: None,
            confidence: None,
            interrupted: false,
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_turn() {
        let turn = ConversationTurn::customer("hello", 0.9).with_sentiment(Sentiment::Neutral);
        assert_eq!(turn.speaker, Speaker::Customer);
        assert_eq!(turn.confidence, Some(0.9));
        assert!(!turn.interrupted);
    }

    #[test]
    fn test_agent_turn() {
        let turn = ConversationTurn::agent("how can I help?").with_intent("greeting");
        assert_eq!(turn.speaker, Speaker::Agent);
        assert_eq!(turn.intent.as_deref(), Some("greeting"));
        assert!(turn.confidence.is_none());
    }

    #[test]
    fn test_polarity() {
        assert_eq!(Sentiment::Positive.polarity(), 0.5);
        assert_eq!(Sentiment::Neutral.polarity(), 0.0);
        assert_eq!(Sentiment::Negative.polarity(), -0.5);
        assert!(Sentiment::Negative.is_negative());
    }
}
