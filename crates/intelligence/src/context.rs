//! Per-call conversation state

use uuid::Uuid;

use call_agent_config::VoiceAgentSettings;
use call_agent_core::{ConversationTurn, Speaker, VoiceParams};

/// Mutable state of one call's conversation.
///
/// Settings are a snapshot taken when the call started; per-number
/// configuration changes never land mid-call. Turns are append-only
/// except for the interruption flag on the latest agent turn.
pub struct ConversationContext {
    pub session_id: Uuid,
    pub settings: VoiceAgentSettings,
    turns: Vec<ConversationTurn>,
    voice: VoiceParams,
    reprompted: bool,
}

impl ConversationContext {
    pub fn new(session_id: Uuid, settings: VoiceAgentSettings) -> Self {
        let voice = settings.voice.clone();
        Self {
            session_id,
            settings,
            turns: Vec::new(),
            voice,
            reprompted: false,
        }
    }

    pub fn push_customer_turn(&mut self, turn: ConversationTurn) {
        debug_assert_eq!(turn.speaker, Speaker::Customer);
        self.reprompted = false;
        self.turns.push(turn);
    }

    pub fn push_agent_turn(&mut self, turn: ConversationTurn) {
        debug_assert_eq!(turn.speaker, Speaker::Agent);
        self.turns.push(turn);
    }

    /// Flag the most recent agent turn as spoken over
    pub fn mark_last_agent_interrupted(&mut self) {
        if let Some(turn) = self
            .turns
            .iter_mut()
            .rev()
            .find(|turn| turn.speaker == Speaker::Agent)
        {
            turn.interrupted = true;
        }
    }

    /// Text of the most recent agent turn, for repeat requests
    pub fn last_agent_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.speaker == Speaker::Agent)
            .map(|turn| turn.text.as_str())
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Effective voice parameters, including mid-call adjustments
    pub fn voice(&self) -> &VoiceParams {
        &self.voice
    }

    /// Slow the agent's speech down a notch
    pub fn slow_down(&mut self) {
        self.voice.speaking_rate = (self.voice.speaking_rate - 0.2).max(0.5);
    }

    /// Raise playback gain a notch
    pub fn speak_up(&mut self) {
        self.voice.volume = (self.voice.volume + 0.25).min(2.0);
    }

    /// Whether a soft-silence re-prompt was already sent for the current
    /// lull. Cleared when the customer speaks again.
    pub fn take_reprompt_slot(&mut self) -> bool {
        if self.reprompted {
            false
        } else {
            self.reprompted = true;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ConversationContext {
        ConversationContext::new(Uuid::new_v4(), VoiceAgentSettings::default())
    }

    #[test]
    fn test_mark_interrupted_targets_latest_agent_turn() {
        let mut ctx = context();
        ctx.push_agent_turn(ConversationTurn::agent("first"));
        ctx.push_customer_turn(ConversationTurn::customer("hi", 0.9));
        ctx.push_agent_turn(ConversationTurn::agent("second"));

        ctx.mark_last_agent_interrupted();

        let turns = ctx.turns();
        assert!(!turns[0].interrupted);
        assert!(turns[2].interrupted);
    }

    #[test]
    fn test_reprompt_slot_resets_on_customer_turn() {
        let mut ctx = context();
        assert!(ctx.take_reprompt_slot());
        assert!(!ctx.take_reprompt_slot());

        ctx.push_customer_turn(ConversationTurn::customer("still here", 0.9));
        assert!(ctx.take_reprompt_slot());
    }

    #[test]
    fn test_slow_down_clamps() {
        let mut ctx = context();
        for _ in 0..10 {
            ctx.slow_down();
        }
        assert!(ctx.voice().speaking_rate >= 0.5);
    }

    #[test]
    fn test_speak_up_clamps() {
        let mut ctx = context();
        assert_eq!(ctx.voice().volume, 1.0);
        for _ in 0..10 {
            ctx.speak_up();
        }
        assert!(ctx.voice().volume <= 2.0);
    }
}
