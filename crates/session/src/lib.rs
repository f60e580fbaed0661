//! Session registry
//!
//! Single authority for call lifecycle state. Every status change in the
//! system goes through [`SessionRegistry::transition`], which enforces
//! the state machine before anything is persisted.

pub mod registry;

pub use registry::{SessionRegistry, TransitionMetadata};

use thiserror::Error;
use uuid::Uuid;

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// The requested status change violates the state machine
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    /// The backing store rejected the write. The session named here is
    /// still live in memory and retrievable through the registry.
    #[error("persistence failed for session {session_id}: {message}")]
    Persistence { session_id: Uuid, message: String },

    #[error("session not found: {0}")]
    NotFound(Uuid),

    /// Session cap reached; the call should be declined upstream
    #[error("session limit reached ({0} active)")]
    AtCapacity(usize),
}
