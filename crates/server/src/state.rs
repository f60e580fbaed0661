//! Shared application state

use std::sync::Arc;

use call_agent_config::EngineSettings;
use call_agent_core::{ResponseGenerator, Synthesizer, Transcriber};
use call_agent_intelligence::IntelligenceEngine;
use call_agent_provider::{ProviderManager, SipProvider, TelephonyProvider, TwilioProvider};
use call_agent_session::SessionRegistry;
use call_agent_storage::{
    ConversationStore, MemoryConversationStore, MemorySessionStore, MemorySettingsStore,
    SessionStore, SettingsStore,
};
use call_agent_streaming::StreamEngine;

/// Everything the handlers need, shared behind one `Arc`
pub struct AppState {
    pub settings: EngineSettings,
    pub registry: Arc<SessionRegistry>,
    pub providers: Arc<ProviderManager>,
    pub intelligence: Arc<IntelligenceEngine>,
    pub stream_engine: Arc<StreamEngine>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub conversations: Arc<dyn ConversationStore>,
}

/// External services the engine is wired to
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub generator: Arc<dyn ResponseGenerator>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            transcriber: Arc::new(crate::collaborators::PassthroughTranscriber),
            synthesizer: Arc::new(crate::collaborators::SilenceSynthesizer),
            generator: Arc::new(crate::collaborators::RuleBasedResponder),
        }
    }
}

impl AppState {
    /// Wire the full engine with in-memory stores.
    pub async fn build(settings: EngineSettings, collaborators: Collaborators) -> Arc<Self> {
        let session_store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let settings_store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::new());
        let conversations: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new());

        let registry = Arc::new(SessionRegistry::new(
            session_store,
            settings_store.clone(),
            settings.server.max_sessions,
        ));

        let providers = Arc::new(ProviderManager::new());
        let twilio = Arc::new(TwilioProvider::new());
        let sip = Arc::new(SipProvider::new());
        if let Err(err) = twilio.initialize().await {
            tracing::warn!(error = %err, "twilio provider initialization failed");
        }
        if let Err(err) = sip.initialize().await {
            tracing::warn!(error = %err, "sip provider initialization failed");
        }
        providers.register(twilio);
        providers.register(sip);

        let intelligence = Arc::new(IntelligenceEngine::new(
            collaborators.generator,
            conversations.clone(),
            settings.escalation.clone(),
        ));

        let stream_engine = Arc::new(StreamEngine::new(
            registry.clone(),
            providers.clone(),
            intelligence.clone(),
            collaborators.transcriber,
            collaborators.synthesizer,
            settings.streaming.clone(),
            settings.interruption.clone(),
        ));

        Arc::new(Self {
            settings,
            registry,
            providers,
            intelligence,
            stream_engine,
            settings_store,
            conversations,
        })
    }

    /// Public websocket URL for a session's audio stream
    pub fn stream_url(&self, session_id: uuid::Uuid) -> String {
        format!(
            "ws://{}:{}/stream/{}",
            self.settings.server.host, self.settings.server.port, session_id
        )
    }
}
