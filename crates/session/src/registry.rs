//! Call session registry
//!
//! Holds the live-call index and mediates every status change. The
//! in-memory copy is the source of truth while a call is up; the store
//! trails it, and writes that fail are queued for reconciliation rather
//! than allowed to take a live call down.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use call_agent_config::VoiceAgentSettings;
use call_agent_core::{CallSession, CallStatus};
use call_agent_storage::{SessionStore, SettingsStore};

use crate::SessionError;

/// Optional fields recorded alongside a status change
#[derive(Debug, Clone, Default)]
pub struct TransitionMetadata {
    /// Why the call ended or was handed off (e.g. "silence_timeout")
    pub reason: Option<String>,
    /// Transfer destination, for `Transferred`
    pub target: Option<String>,
    /// Language detected mid-call, if it changed
    pub detected_language: Option<String>,
}

impl TransitionMetadata {
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Registry of live call sessions
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    settings: Arc<dyn SettingsStore>,
    active: RwLock<HashMap<Uuid, Arc<RwLock<CallSession>>>>,
    pending_reconcile: Mutex<Vec<CallSession>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn SessionStore>,
        settings: Arc<dyn SettingsStore>,
        max_sessions: usize,
    ) -> Self {
        Self {
            store,
            settings,
            active: RwLock::new(HashMap::new()),
            pending_reconcile: Mutex::new(Vec::new()),
            max_sessions,
        }
    }

    /// Create a session for an accepted inbound call.
    ///
    /// The session is indexed in memory before the store write, so a
    /// persistence failure leaves a usable session behind: the error
    /// carries its id and [`get_session`](Self::get_session) will find
    /// it. The failed write is queued for [`reconcile`](Self::reconcile).
    pub async fn create_session(
        &self,
        business_number: &str,
        caller_number: &str,
        provider: &str,
        provider_call_ref: &str,
        language: &str,
    ) -> Result<CallSession, SessionError> {
        let session = CallSession::new(
            business_number,
            caller_number,
            provider,
            provider_call_ref,
            language,
        );
        let snapshot = session.clone();

        // Check and insert under one write guard, so concurrent creates
        // cannot both slip past the capacity check.
        {
            let mut active = self.active.write();
            if active.len() >= self.max_sessions {
                return Err(SessionError::AtCapacity(active.len()));
            }
            active.insert(session.id, Arc::new(RwLock::new(session)));
        }

        if let Err(err) = self.store.create(&snapshot).await {
            tracing::warn!(
                session_id = %snapshot.id,
                error = %err,
                "session create not persisted, queued for reconciliation"
            );
            self.pending_reconcile.lock().push(snapshot.clone());
            return Err(SessionError::Persistence {
                session_id: snapshot.id,
                message: err.to_string(),
            });
        }

        tracing::info!(
            session_id = %snapshot.id,
            provider = %snapshot.provider,
            caller = %snapshot.caller_number,
            "call session created"
        );
        Ok(snapshot)
    }

    /// Apply a status change, enforcing the state machine.
    ///
    /// Terminal transitions stamp `ended_at` and drop the session from
    /// the live index. A store failure after a valid transition is
    /// queued for reconciliation and does not fail the call.
    pub async fn transition(
        &self,
        session_id: Uuid,
        next: CallStatus,
        metadata: TransitionMetadata,
    ) -> Result<CallSession, SessionError> {
        let entry = self.lookup(session_id).await?;

        let snapshot = {
            let mut session = entry.write();
            if !session.status.can_transition_to(next) {
                return Err(SessionError::InvalidTransition {
                    from: session.status.as_str(),
                    to: next.as_str(),
                });
            }
            session.status = next;
            if let Some(reason) = metadata.reason {
                session.escalation_reason = Some(reason);
            }
            if let Some(target) = metadata.target {
                session.escalation_target = Some(target);
            }
            if let Some(language) = metadata.detected_language {
                session.detected_language = Some(language);
            }
            if next.is_terminal() {
                session.ended_at = Some(Utc::now());
            }
            session.clone()
        };

        if next.is_terminal() {
            self.active.write().remove(&session_id);
        }

        if let Err(err) = self.store.update(&snapshot).await {
            tracing::warn!(
                session_id = %session_id,
                status = next.as_str(),
                error = %err,
                "status change not persisted, queued for reconciliation"
            );
            self.pending_reconcile.lock().push(snapshot.clone());
        }

        tracing::info!(
            session_id = %session_id,
            status = next.as_str(),
            reason = snapshot.escalation_reason.as_deref().unwrap_or(""),
            "session transitioned"
        );
        Ok(snapshot)
    }

    /// Fetch a session by id, preferring the live index over the store.
    pub async fn get_session(&self, session_id: Uuid) -> Result<CallSession, SessionError> {
        Ok(self.lookup(session_id).await?.read().clone())
    }

    /// Effective voice agent settings for a business number.
    ///
    /// Falls back to defaults when the number has no saved settings or
    /// the store is unreachable; a settings outage must not block calls.
    pub async fn voice_agent_settings(&self, business_number: &str) -> VoiceAgentSettings {
        match self.settings.get_voice_agent_settings(business_number).await {
            Ok(Some(settings)) => settings,
            Ok(None) => VoiceAgentSettings::default(),
            Err(err) => {
                tracing::warn!(
                    business_number = %business_number,
                    error = %err,
                    "settings lookup failed, using defaults"
                );
                VoiceAgentSettings::default()
            }
        }
    }

    /// Snapshot of every live (non-terminal) session
    pub fn active_sessions(&self) -> Vec<CallSession> {
        self.active
            .read()
            .values()
            .map(|entry| entry.read().clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    /// Retry queued store writes. Returns how many are still pending.
    pub async fn reconcile(&self) -> usize {
        let pending: Vec<CallSession> = std::mem::take(&mut *self.pending_reconcile.lock());
        if pending.is_empty() {
            return 0;
        }

        let mut still_failing = Vec::new();
        for snapshot in pending {
            if let Err(err) = self.store.update(&snapshot).await {
                tracing::warn!(session_id = %snapshot.id, error = %err, "reconciliation retry failed");
                still_failing.push(snapshot);
            } else {
                tracing::info!(session_id = %snapshot.id, "session record reconciled");
            }
        }

        let remaining = still_failing.len();
        if remaining > 0 {
            self.pending_reconcile.lock().extend(still_failing);
        }
        remaining
    }

    async fn lookup(&self, session_id: Uuid) -> Result<Arc<RwLock<CallSession>>, SessionError> {
        if let Some(entry) = self.active.read().get(&session_id) {
            return Ok(entry.clone());
        }

        let stored = self
            .store
            .get(session_id)
            .await
            .map_err(|err| SessionError::Persistence {
                session_id,
                message: err.to_string(),
            })?
            .ok_or(SessionError::NotFound(session_id))?;

        // Terminal sessions stay out of the live index.
        if stored.status.is_terminal() {
            return Ok(Arc::new(RwLock::new(stored)));
        }

        let mut active = self.active.write();
        let entry = active
            .entry(session_id)
            .or_insert_with(|| Arc::new(RwLock::new(stored)));
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use call_agent_storage::{MemorySessionStore, MemorySettingsStore, PersistenceError};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemorySettingsStore::new()),
            100,
        )
    }

    async fn create(registry: &SessionRegistry) -> CallSession {
        registry
            .create_session("+1555000", "+1555111", "twilio", "CA1", "en")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_activate_then_end() {
        let registry = registry();
        let session = create(&registry).await;
        assert_eq!(session.status, CallStatus::Ringing);

        let session = registry
            .transition(session.id, CallStatus::Active, TransitionMetadata::default())
            .await
            .unwrap();
        assert_eq!(session.status, CallStatus::Active);
        assert!(session.ended_at.is_none());

        let session = registry
            .transition(
                session.id,
                CallStatus::Ended,
                TransitionMetadata::with_reason("caller_goodbye"),
            )
            .await
            .unwrap();
        assert_eq!(session.status, CallStatus::Ended);
        assert!(session.ended_at.is_some());
        assert!(session.duration_seconds().is_some());
        assert_eq!(session.escalation_reason.as_deref(), Some("caller_goodbye"));
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_ringing_cannot_end_directly() {
        let registry = registry();
        let session = create(&registry).await;

        let err = registry
            .transition(session.id, CallStatus::Ended, TransitionMetadata::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));

        // Still live and still ringing.
        let session = registry.get_session(session.id).await.unwrap();
        assert_eq!(session.status, CallStatus::Ringing);
    }

    #[tokio::test]
    async fn test_terminal_sessions_are_frozen() {
        let registry = registry();
        let session = create(&registry).await;
        registry
            .transition(session.id, CallStatus::Active, TransitionMetadata::default())
            .await
            .unwrap();
        registry
            .transition(session.id, CallStatus::Failed, TransitionMetadata::default())
            .await
            .unwrap();

        for next in CallStatus::all() {
            let result = registry
                .transition(session.id, next, TransitionMetadata::default())
                .await;
            assert!(
                matches!(result, Err(SessionError::InvalidTransition { .. })),
                "failed -> {:?} must be rejected",
                next
            );
        }
    }

    #[tokio::test]
    async fn test_transfer_records_target() {
        let registry = registry();
        let session = create(&registry).await;
        registry
            .transition(session.id, CallStatus::Active, TransitionMetadata::default())
            .await
            .unwrap();

        let metadata = TransitionMetadata {
            reason: Some("negative_sentiment".to_string()),
            target: Some("+1555999".to_string()),
            detected_language: None,
        };
        let session = registry
            .transition(session.id, CallStatus::Transferred, metadata)
            .await
            .unwrap();
        assert_eq!(session.escalation_target.as_deref(), Some("+1555999"));
        assert_eq!(
            session.escalation_reason.as_deref(),
            Some("negative_sentiment")
        );
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let registry = registry();
        let err = registry.get_session(Uuid::new_v4()).await.err().unwrap();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let registry = SessionRegistry::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemorySettingsStore::new()),
            1,
        );
        create(&registry).await;

        let err = registry
            .create_session("+1555000", "+1555222", "twilio", "CA2", "en")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::AtCapacity(1)));
    }

    #[tokio::test]
    async fn test_concurrent_creates_respect_capacity() {
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemorySettingsStore::new()),
            5,
        ));

        let mut handles = Vec::new();
        for i in 0..20 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .create_session(
                        "+1555000",
                        &format!("+155511{i}"),
                        "twilio",
                        &format!("CA{i}"),
                        "en",
                    )
                    .await
            }));
        }

        let mut created = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(SessionError::AtCapacity(_)) => rejected += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        // Exactly the capacity may win the race, never one more.
        assert_eq!(created, 5);
        assert_eq!(rejected, 15);
        assert_eq!(registry.active_count(), 5);
    }

    #[tokio::test]
    async fn test_ended_session_loaded_from_store() {
        let store = Arc::new(MemorySessionStore::new());
        let registry = SessionRegistry::new(
            store.clone(),
            Arc::new(MemorySettingsStore::new()),
            100,
        );
        let session = create(&registry).await;
        registry
            .transition(session.id, CallStatus::Active, TransitionMetadata::default())
            .await
            .unwrap();
        registry
            .transition(session.id, CallStatus::Ended, TransitionMetadata::default())
            .await
            .unwrap();
        assert_eq!(registry.active_count(), 0);

        // History stays readable after the live entry is dropped.
        let loaded = registry.get_session(session.id).await.unwrap();
        assert_eq!(loaded.status, CallStatus::Ended);
        assert_eq!(registry.active_count(), 0);
    }

    /// Store that fails every write until released.
    struct FlakyStore {
        inner: MemorySessionStore,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemorySessionStore::new(),
                failing: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl SessionStore for FlakyStore {
        async fn create(&self, session: &CallSession) -> Result<(), PersistenceError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PersistenceError::Backend("write timeout".to_string()));
            }
            self.inner.create(session).await
        }

        async fn update(&self, session: &CallSession) -> Result<(), PersistenceError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PersistenceError::Backend("write timeout".to_string()));
            }
            self.inner.update(session).await
        }

        async fn get(&self, session_id: Uuid) -> Result<Option<CallSession>, PersistenceError> {
            self.inner.get(session_id).await
        }
    }

    #[tokio::test]
    async fn test_create_survives_store_outage() {
        let store = Arc::new(FlakyStore::new());
        let registry = SessionRegistry::new(
            store.clone(),
            Arc::new(MemorySettingsStore::new()),
            100,
        );

        let err = registry
            .create_session("+1555000", "+1555111", "twilio", "CA1", "en")
            .await
            .err()
            .unwrap();
        let session_id = match err {
            SessionError::Persistence { session_id, .. } => session_id,
            other => panic!("expected persistence error, got {:?}", other),
        };

        // The call goes on: the session is live and can transition.
        let session = registry.get_session(session_id).await.unwrap();
        assert_eq!(session.status, CallStatus::Ringing);
        registry
            .transition(session_id, CallStatus::Active, TransitionMetadata::default())
            .await
            .unwrap();

        // Once the store recovers, reconciliation catches the record up.
        store.failing.store(false, Ordering::SeqCst);
        assert_eq!(registry.reconcile().await, 0);
        let persisted = store.inner.get(session_id).await.unwrap().unwrap();
        assert_eq!(persisted.status, CallStatus::Active);
    }
}
