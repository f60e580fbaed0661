//! Conversation intelligence
//!
//! Everything that decides what the agent says next: sentiment and intent
//! classification, escalation scoring, and the per-call conversation loop
//! that ties them to the reply generator.

pub mod context;
pub mod engine;
pub mod escalation;
pub mod intent;
pub mod sentiment;

pub use context::ConversationContext;
pub use engine::IntelligenceEngine;
pub use escalation::{escalation_score, should_escalate};
pub use intent::{detect_call_control, CallControlIntent};
pub use sentiment::{SentimentAnalyzer, SentimentScore};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum IntelligenceError {
    #[error("no conversation for session {0}")]
    UnknownSession(Uuid),

    #[error(transparent)]
    Persistence(#[from] call_agent_storage::PersistenceError),
}
