//! Configuration for the call-agent engine
//!
//! Two layers live here:
//! - engine-wide settings (`EngineSettings`), loaded from files and
//!   environment variables
//! - per-business-number voice agent settings (`VoiceAgentSettings`),
//!   supplied by the settings store and treated as an immutable snapshot
//!   for the duration of a call

pub mod settings;
pub mod voice;

pub use settings::{
    load_settings, EngineSettings, EscalationWeights, InterruptionConfig, ObservabilityConfig,
    ServerConfig, StreamingConfig,
};
pub use voice::{BusinessHours, EscalationTriggers, VoiceAgentSettings};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
