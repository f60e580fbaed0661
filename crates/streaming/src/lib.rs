//! Bidirectional audio streaming pipeline
//!
//! Owns the per-call stream loop: frame decode, interruption detection,
//! transcription windowing, response dispatch, and the silence and
//! call-duration watchdogs. Everything here funnels into a single
//! idempotent finalize path per call.

pub mod engine;
pub mod frame;
pub mod stream;

pub use engine::StreamEngine;
pub use frame::{chunk_energy, AudioChunkFrame, FrameError, FRAME_HEADER_LEN};
pub use stream::{OutboundEvent, StreamState};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StreamingError {
    #[error(transparent)]
    Session(#[from] call_agent_session::SessionError),

    #[error(transparent)]
    Provider(#[from] call_agent_provider::ProviderError),

    #[error(transparent)]
    Intelligence(#[from] call_agent_intelligence::IntelligenceError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("no telephony provider registered under '{0}'")]
    UnknownProvider(String),

    #[error("session {0} already has an open stream")]
    AlreadyStreaming(Uuid),

    #[error("no open stream for session {0}")]
    StreamNotFound(Uuid),

    #[error("session {0} is already closed")]
    SessionClosed(Uuid),
}
