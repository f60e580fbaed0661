//! Durable-storage abstraction
//!
//! The engine never assumes a storage technology; everything durable
//! goes through the traits here. Writes are treated as eventually
//! consistent and the session id is the stable primary key.
//!
//! In-memory implementations back tests and single-node deployments.

pub mod conversation_store;
pub mod error;
pub mod session_store;
pub mod settings_store;

pub use conversation_store::{ConversationStore, MemoryConversationStore};
pub use error::PersistenceError;
pub use session_store::{MemorySessionStore, SessionStore};
pub use settings_store::{MemorySettingsStore, SettingsStore};
