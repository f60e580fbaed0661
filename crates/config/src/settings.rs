//! Engine-wide settings
//!
//! Loaded from `config/default`, an optional environment-specific file,
//! and `CALL_AGENT__` environment variables, highest priority last.
//!
//! The interruption heuristic and escalation weights started life as
//! magic constants. They are deliberately named, overridable fields here
//! with the original literals as defaults; nothing downstream should
//! assume they are well calibrated.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Main engine settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineSettings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub streaming: StreamingConfig,

    #[serde(default)]
    pub interruption: InterruptionConfig,

    #[serde(default)]
    pub escalation: EscalationWeights,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interruption.energy_ratio < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "interruption.energy_ratio".to_string(),
                message: "ratio below 1.0 would flag every chunk as an interruption".to_string(),
            });
        }
        if self.streaming.chunk_window_ms < 100 {
            return Err(ConfigError::InvalidValue {
                field: "streaming.chunk_window_ms".to_string(),
                message: "window too small (minimum 100ms)".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.escalation.escalate_score) {
            return Err(ConfigError::InvalidValue {
                field: "escalation.escalate_score".to_string(),
                message: "must be within 0.0..=1.0".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent call sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_sessions() -> usize {
    500
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_sessions: default_max_sessions(),
            cors_enabled: default_true(),
        }
    }
}

/// Streaming pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Audio window handed to transcription in one batch
    #[serde(default = "default_chunk_window_ms")]
    pub chunk_window_ms: u32,

    /// Inbound audio rate used to size the transcription window
    /// (16kHz, 16-bit mono PCM)
    #[serde(default = "default_bytes_per_second")]
    pub bytes_per_second: u32,

    /// Interval of the silence-monitor sweep across active streams
    #[serde(default = "default_sweep_interval")]
    pub silence_sweep_interval_seconds: u64,

    /// Silence before the agent sends a gentle re-prompt
    #[serde(default = "default_soft_silence")]
    pub soft_silence_prompt_seconds: f32,
}

fn default_chunk_window_ms() -> u32 {
    1000
}
fn default_bytes_per_second() -> u32 {
    32000
}
fn default_sweep_interval() -> u64 {
    5
}
fn default_soft_silence() -> f32 {
    10.0
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_window_ms: default_chunk_window_ms(),
            bytes_per_second: default_bytes_per_second(),
            silence_sweep_interval_seconds: default_sweep_interval(),
            soft_silence_prompt_seconds: default_soft_silence(),
        }
    }
}

impl StreamingConfig {
    /// Bytes buffered before a transcription flush
    pub fn window_bytes(&self) -> usize {
        (self.bytes_per_second as u64 * self.chunk_window_ms as u64 / 1000) as usize
    }
}

/// Interruption-detection heuristic.
///
/// A chunk counts as an interruption when its energy exceeds
/// `energy_ratio` times the previous chunk's energy and also clears
/// `energy_floor`. Energy is mean absolute amplitude of 16-bit samples,
/// normalized to 0.0..1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptionConfig {
    #[serde(default = "default_energy_ratio")]
    pub energy_ratio: f32,

    #[serde(default = "default_energy_floor")]
    pub energy_floor: f32,
}

fn default_energy_ratio() -> f32 {
    2.0
}
fn default_energy_floor() -> f32 {
    0.01
}

impl Default for InterruptionConfig {
    fn default() -> Self {
        Self {
            energy_ratio: default_energy_ratio(),
            energy_floor: default_energy_floor(),
        }
    }
}

/// Escalation scoring weights.
///
/// The score is recomputed from the recent turn window on every customer
/// turn; it is never an accumulating counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationWeights {
    /// Added when the current turn's confidence is below the configured
    /// low-confidence trigger
    #[serde(default = "default_low_confidence_weight")]
    pub low_confidence: f32,

    /// Added when the current turn's sentiment is negative
    #[serde(default = "default_negative_sentiment_weight")]
    pub negative_sentiment: f32,

    /// Added when enough recent turns had low confidence
    #[serde(default = "default_repeated_low_confidence_weight")]
    pub repeated_low_confidence: f32,

    /// Added when the conversation runs long without resolution
    #[serde(default = "default_long_conversation_weight")]
    pub long_conversation: f32,

    /// How many recent confidence-bearing turns to inspect
    #[serde(default = "default_window")]
    pub window: usize,

    /// Confidence below this counts as a low-confidence turn in the window
    #[serde(default = "default_window_confidence")]
    pub window_confidence_threshold: f32,

    /// Low-confidence turns in the window needed to add the repeated weight
    #[serde(default = "default_window_hits")]
    pub window_hits: usize,

    /// Turn count past which the long-conversation weight applies
    #[serde(default = "default_long_conversation_turns")]
    pub long_conversation_turns: usize,

    /// Hard escalation ceiling
    #[serde(default = "default_escalate_score")]
    pub escalate_score: f32,

    /// Lower ceiling that applies when sentiment is negative
    #[serde(default = "default_negative_escalate_score")]
    pub negative_escalate_score: f32,
}

fn default_low_confidence_weight() -> f32 {
    0.3
}
fn default_negative_sentiment_weight() -> f32 {
    0.4
}
fn default_repeated_low_confidence_weight() -> f32 {
    0.3
}
fn default_long_conversation_weight() -> f32 {
    0.2
}
fn default_window() -> usize {
    5
}
fn default_window_confidence() -> f32 {
    0.6
}
fn default_window_hits() -> usize {
    3
}
fn default_long_conversation_turns() -> usize {
    20
}
fn default_escalate_score() -> f32 {
    0.7
}
fn default_negative_escalate_score() -> f32 {
    0.5
}

impl Default for EscalationWeights {
    fn default() -> Self {
        Self {
            low_confidence: default_low_confidence_weight(),
            negative_sentiment: default_negative_sentiment_weight(),
            repeated_low_confidence: default_repeated_low_confidence_weight(),
            long_conversation: default_long_conversation_weight(),
            window: default_window(),
            window_confidence_threshold: default_window_confidence(),
            window_hits: default_window_hits(),
            long_conversation_turns: default_long_conversation_turns(),
            escalate_score: default_escalate_score(),
            negative_escalate_score: default_negative_escalate_score(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`CALL_AGENT` prefix, `__` separator)
/// 2. `config/{env}.yaml` (if an environment name is given)
/// 3. `config/default.yaml`
pub fn load_settings(env: Option<&str>) -> Result<EngineSettings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("CALL_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let settings: EngineSettings = builder.build()?.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}
