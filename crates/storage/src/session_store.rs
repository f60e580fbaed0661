//! Session record persistence

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use call_agent_core::CallSession;

use crate::PersistenceError;

/// Durable store for call session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write a new session record. Upserts on conflict so that
    /// reconciliation retries are safe.
    async fn create(&self, session: &CallSession) -> Result<(), PersistenceError>;

    /// Overwrite an existing session record
    async fn update(&self, session: &CallSession) -> Result<(), PersistenceError>;

    async fn get(&self, session_id: Uuid) -> Result<Option<CallSession>, PersistenceError>;
}

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, CallSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &CallSession) -> Result<(), PersistenceError> {
        self.sessions.write().insert(session.id, session.clone());
        tracing::debug!(session_id = %session.id, "session record created");
        Ok(())
    }

    async fn update(&self, session: &CallSession) -> Result<(), PersistenceError> {
        self.sessions.write().insert(session.id, session.clone());
        tracing::debug!(session_id = %session.id, status = session.status.as_str(), "session record updated");
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<CallSession>, PersistenceError> {
        Ok(self.sessions.read().get(&session_id).cloned())
    }
}
