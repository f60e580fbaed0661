//! Escalation scoring
//!
//! Pure functions over the recent turn history. The score is recomputed
//! from scratch on every customer turn; there is no accumulating counter
//! that could drift from the history it summarizes.

use call_agent_config::{EscalationTriggers, EscalationWeights};
use call_agent_core::{ConversationTurn, Sentiment, Speaker};

/// Compute the escalation score for the current customer turn.
///
/// `history` must already include the current turn. The repeated
/// low-confidence signal looks at the last `weights.window`
/// confidence-bearing customer turns.
pub fn escalation_score(
    weights: &EscalationWeights,
    triggers: &EscalationTriggers,
    history: &[ConversationTurn],
    current_confidence: f32,
    sentiment: Sentiment,
) -> f32 {
    let mut score = 0.0f32;

    if current_confidence < triggers.low_confidence_threshold {
        score += weights.low_confidence;
    }

    if sentiment.is_negative() {
        score += weights.negative_sentiment;
    }

    let low_confidence_hits = history
        .iter()
        .rev()
        .filter(|turn| turn.speaker == Speaker::Customer && turn.confidence.is_some())
        .take(weights.window)
        .filter(|turn| turn.confidence.unwrap_or(1.0) < weights.window_confidence_threshold)
        .count();
    if low_confidence_hits >= weights.window_hits {
        score += weights.repeated_low_confidence;
    }

    if history.len() > weights.long_conversation_turns {
        score += weights.long_conversation;
    }

    score.min(1.0)
}

/// Decide whether the call escalates, and why.
///
/// Returns a machine-readable reason, or `None` to continue.
pub fn should_escalate(
    weights: &EscalationWeights,
    triggers: &EscalationTriggers,
    score: f32,
    current_confidence: f32,
    sentiment: Sentiment,
) -> Option<&'static str> {
    if current_confidence < triggers.low_confidence_threshold {
        return Some("low_confidence");
    }
    if sentiment.is_negative() && score >= weights.negative_escalate_score {
        return Some("negative_sentiment");
    }
    if score >= weights.escalate_score {
        return Some("escalation_score");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(confidence: f32) -> ConversationTurn {
        ConversationTurn::customer("some words", confidence)
    }

    fn defaults() -> (EscalationWeights, EscalationTriggers) {
        (EscalationWeights::default(), EscalationTriggers::default())
    }

    #[test]
    fn test_confident_neutral_turn_scores_zero() {
        let (weights, triggers) = defaults();
        let history = vec![customer(0.95)];
        let score = escalation_score(&weights, &triggers, &history, 0.95, Sentiment::Neutral);
        assert_eq!(score, 0.0);
        assert!(should_escalate(&weights, &triggers, score, 0.95, Sentiment::Neutral).is_none());
    }

    #[test]
    fn test_repeated_low_confidence_with_negative_sentiment_escalates() {
        let (weights, triggers) = defaults();
        // Three shaky transcriptions in a row, customer turning sour.
        let history = vec![
            ConversationTurn::agent("hello"),
            customer(0.4),
            ConversationTurn::agent("could you repeat that?"),
            customer(0.5),
            ConversationTurn::agent("I'm sorry, once more?"),
            customer(0.55),
        ];
        let score = escalation_score(&weights, &triggers, &history, 0.55, Sentiment::Negative);
        // negative (0.4) + repeated low confidence (0.3)
        assert!((score - 0.7).abs() < f32::EPSILON);
        assert_eq!(
            should_escalate(&weights, &triggers, score, 0.55, Sentiment::Negative),
            Some("negative_sentiment")
        );
    }

    #[test]
    fn test_very_low_confidence_escalates_directly() {
        let (weights, triggers) = defaults();
        let history = vec![customer(0.2)];
        let score = escalation_score(&weights, &triggers, &history, 0.2, Sentiment::Neutral);
        assert_eq!(
            should_escalate(&weights, &triggers, score, 0.2, Sentiment::Neutral),
            Some("low_confidence")
        );
    }

    #[test]
    fn test_window_only_counts_recent_turns() {
        let (weights, triggers) = defaults();
        // Three old low-confidence turns pushed out of the window by
        // five clean ones.
        let mut history: Vec<ConversationTurn> =
            (0..3).map(|_| customer(0.4)).collect();
        history.extend((0..5).map(|_| customer(0.9)));

        let score = escalation_score(&weights, &triggers, &history, 0.9, Sentiment::Neutral);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_long_conversation_weight() {
        let (weights, triggers) = defaults();
        let history: Vec<ConversationTurn> = (0..21).map(|_| customer(0.9)).collect();
        let score = escalation_score(&weights, &triggers, &history, 0.9, Sentiment::Neutral);
        assert!((score - weights.long_conversation).abs() < f32::EPSILON);
        // On its own, not enough to escalate.
        assert!(should_escalate(&weights, &triggers, score, 0.9, Sentiment::Neutral).is_none());
    }

    #[test]
    fn test_score_caps_at_one() {
        let (weights, triggers) = defaults();
        let history: Vec<ConversationTurn> = (0..25).map(|_| customer(0.1)).collect();
        let score = escalation_score(&weights, &triggers, &history, 0.1, Sentiment::Negative);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let (weights, triggers) = defaults();
        let history = vec![customer(0.4), customer(0.5), customer(0.55)];
        let first = escalation_score(&weights, &triggers, &history, 0.55, Sentiment::Negative);
        let second = escalation_score(&weights, &triggers, &history, 0.55, Sentiment::Negative);
        assert_eq!(first, second);
    }

    #[test]
    fn test_negative_sentiment_alone_does_not_escalate() {
        let (weights, triggers) = defaults();
        let history = vec![customer(0.9)];
        let score = escalation_score(&weights, &triggers, &history, 0.9, Sentiment::Negative);
        assert!((score - weights.negative_sentiment).abs() < f32::EPSILON);
        assert!(should_escalate(&weights, &triggers, score, 0.9, Sentiment::Negative).is_none());
    }
}
