//! Conversation history persistence
//!
//! Turn history is flushed in one batch when a call reaches a terminal
//! status, not incrementally. `save_turns` replaces the batch for the
//! session id, so retrying a flush can never duplicate rows.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use call_agent_core::ConversationTurn;

use crate::PersistenceError;

/// Durable store for per-call turn history
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Store the full turn history for a session, replacing any
    /// previously stored batch for the same id.
    async fn save_turns(
        &self,
        session_id: Uuid,
        turns: &[ConversationTurn],
    ) -> Result<(), PersistenceError>;

    async fn load_turns(&self, session_id: Uuid)
        -> Result<Vec<ConversationTurn>, PersistenceError>;
}

/// In-memory conversation store
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: RwLock<HashMap<Uuid, Vec<ConversationTurn>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn save_turns(
        &self,
        session_id: Uuid,
        turns: &[ConversationTurn],
    ) -> Result<(), PersistenceError> {
        self.conversations.write().insert(session_id, turns.to_vec());
        tracing::debug!(session_id = %session_id, turns = turns.len(), "conversation flushed");
        Ok(())
    }

    async fn load_turns(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<ConversationTurn>, PersistenceError> {
        Ok(self
            .conversations
            .read()
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }
}
