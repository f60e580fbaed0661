//! Provider registry
//!
//! Providers are registered by name at startup and looked up per call.
//! An unregistered name returns `None`; callers treat that as a fatal
//! configuration error for the call, not something to retry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::TelephonyProvider;

/// Name-keyed registry of telephony providers
#[derive(Default)]
pub struct ProviderManager {
    providers: RwLock<HashMap<String, Arc<dyn TelephonyProvider>>>,
}

impl ProviderManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, provider: Arc<dyn TelephonyProvider>) {
        let name = provider.name().to_string();
        self.providers.write().insert(name.clone(), provider);
        tracing::info!(provider = %name, "telephony provider registered");
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TelephonyProvider>> {
        self.providers.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }
}
