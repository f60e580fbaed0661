//! Voice agent settings persistence
//!
//! Settings are keyed by business phone number. A missing entry is a
//! normal, expected case; callers fall back to defaults.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use call_agent_config::VoiceAgentSettings;

use crate::PersistenceError;

/// Store for per-number voice agent configuration
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_voice_agent_settings(
        &self,
        business_number: &str,
    ) -> Result<Option<VoiceAgentSettings>, PersistenceError>;

    async fn set_voice_agent_settings(
        &self,
        business_number: &str,
        settings: VoiceAgentSettings,
    ) -> Result<(), PersistenceError>;
}

/// In-memory settings store
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: RwLock<HashMap<String, VoiceAgentSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_voice_agent_settings(
        &self,
        business_number: &str,
    ) -> Result<Option<VoiceAgentSettings>, PersistenceError> {
        Ok(self.settings.read().get(business_number).cloned())
    }

    async fn set_voice_agent_settings(
        &self,
        business_number: &str,
        settings: VoiceAgentSettings,
    ) -> Result<(), PersistenceError> {
        self.settings
            .write()
            .insert(business_number.to_string(), settings);
        Ok(())
    }
}
