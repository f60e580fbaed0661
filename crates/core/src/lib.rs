//! Core types for the call-agent engine
//!
//! This crate provides foundational types used across all other crates:
//! - Call session and lifecycle status
//! - Conversation turns and sentiment
//! - Voice response decisions
//! - Collaborator traits (transcription, synthesis, reply generation)

pub mod collaborators;
pub mod response;
pub mod session;
pub mod turn;

pub use collaborators::{
    CollaboratorError, GeneratedReply, ResponseGenerator, Synthesizer, Transcriber, Transcription,
    VoiceParams,
};
pub use response::VoiceResponse;
pub use session::{CallSession, CallStatus};
pub use turn::{ConversationTurn, Sentiment, Speaker};
