//! Call session lifecycle
//!
//! One `CallSession` per real phone call. Status changes go through the
//! session registry, which validates them against the state machine here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a call.
///
/// Machine: `Ringing -> Active -> {Ended, Transferred}`, plus
/// `Ringing -> Failed` and `Active -> Failed`. The three end states are
/// terminal; nothing transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Inbound call accepted, audio channel not yet open
    Ringing,
    /// Audio channel open, conversation in progress
    Active,
    /// Call completed normally
    Ended,
    /// Call handed off to a human agent
    Transferred,
    /// Call aborted by an error
    Failed,
}

impl CallStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Transferred | CallStatus::Failed)
    }

    /// Whether the state machine permits moving to `next`
    pub fn can_transition_to(&self, next: CallStatus) -> bool {
        matches!(
            (self, next),
            (CallStatus::Ringing, CallStatus::Active)
                | (CallStatus::Ringing, CallStatus::Failed)
                | (CallStatus::Active, CallStatus::Ended)
                | (CallStatus::Active, CallStatus::Transferred)
                | (CallStatus::Active, CallStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ringing => "ringing",
            CallStatus::Active => "active",
            CallStatus::Ended => "ended",
            CallStatus::Transferred => "transferred",
            CallStatus::Failed => "failed",
        }
    }

    /// All statuses, for exhaustive transition checks
    pub fn all() -> [CallStatus; 5] {
        [
            CallStatus::Ringing,
            CallStatus::Active,
            CallStatus::Ended,
            CallStatus::Transferred,
            CallStatus::Failed,
        ]
    }
}

/// One real phone call.
///
/// Invariant: `ended_at` is set iff `status.is_terminal()`. Duration is
/// derived from the timestamps and never stored independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    /// Session ID
    pub id: Uuid,
    /// Business-side phone number
    pub business_number: String,
    /// Caller phone number
    pub caller_number: String,
    /// Telephony provider name (e.g. "twilio", "sip")
    pub provider: String,
    /// Provider-native call reference
    pub provider_call_ref: String,
    /// Lifecycle status
    pub status: CallStatus,
    /// Configured spoken-language tag
    pub language: String,
    /// Language detected during the call, if any
    pub detected_language: Option<String>,
    /// Start timestamp
    pub started_at: DateTime<Utc>,
    /// End timestamp, set on entry to a terminal status
    pub ended_at: Option<DateTime<Utc>>,
    /// Why the call was escalated, if it was
    pub escalation_reason: Option<String>,
    /// Where the call was transferred, if it was
    pub escalation_target: Option<String>,
}

impl CallSession {
    /// Create a new session in `Ringing` state
    pub fn new(
        business_number: impl Into<String>,
        caller_number: impl Into<String>,
        provider: impl Into<String>,
        provider_call_ref: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_number: business_number.into(),
            caller_number: caller_number.into(),
            provider: provider.into(),
            provider_call_ref: provider_call_ref.into(),
            status: CallStatus::Ringing,
            language: language.into(),
            detected_language: None,
            started_at: Utc::now(),
            ended_at: None,
            escalation_reason: None,
            escalation_target: None,
        }
    }

    /// Call duration in seconds, derived from the timestamps.
    ///
    /// `None` until the session reaches a terminal status.
    pub fn duration_seconds(&self) -> Option<i64> {
        self.ended_at.map(|end| (end - self.started_at).num_seconds())
    }

    /// Check the `ended_at` iff terminal invariant
    pub fn invariant_holds(&self) -> bool {
        self.ended_at.is_some() == self.status.is_terminal()
    }
}
