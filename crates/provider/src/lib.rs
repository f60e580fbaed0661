//! Telephony provider abstraction
//!
//! Every upstream consumer (streaming pipeline, webhook handler) programs
//! against the interfaces here, so adding a new telephony backend never
//! touches session or intelligence logic. Each provider is a leaf adapter
//! with no shared mutable state.

pub mod manager;
pub mod sip;
pub mod traits;
pub mod twilio;

pub use manager::ProviderManager;
pub use sip::SipProvider;
pub use traits::{CallEvent, CallHandler, CallMetrics, ProviderFeatures, TelephonyProvider};
pub use twilio::TwilioProvider;

use thiserror::Error;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider lacks this capability. Check `supported_features`
    /// before calling where feasible.
    #[error("operation not supported by provider: {0}")]
    Unsupported(String),

    #[error("provider connection error: {0}")]
    Connection(String),

    #[error("call transfer failed: {0}")]
    Transfer(String),

    #[error("call not found: {0}")]
    CallNotFound(String),
}
