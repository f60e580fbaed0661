//! Lexicon-based sentiment classification
//!
//! Deliberately simple: word-list scoring over the transcribed utterance.
//! Phone-call turns are short, so a handful of strong markers carries
//! most of the signal. Scores saturate at 1.0.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use call_agent_core::Sentiment;

static POSITIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "great", "good", "excellent", "wonderful", "perfect", "thanks", "thank", "awesome",
        "helpful", "appreciate", "love", "nice", "happy", "pleased", "fantastic", "brilliant",
        "yes", "sure", "definitely",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bad",
        "terrible",
        "awful",
        "horrible",
        "useless",
        "angry",
        "frustrated",
        "frustrating",
        "annoyed",
        "annoying",
        "ridiculous",
        "unacceptable",
        "disappointed",
        "disappointing",
        "worst",
        "hate",
        "wrong",
        "broken",
        "waste",
        "stupid",
        "complaint",
        "refund",
        "cancel",
    ]
    .into_iter()
    .collect()
});

static ABUSIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["idiot", "moron", "shut", "damn", "hell", "crap", "screw"]
        .into_iter()
        .collect()
});

const WORD_WEIGHT: f32 = 0.2;

/// Classification result for one utterance
#[derive(Debug, Clone, Copy)]
pub struct SentimentScore {
    pub sentiment: Sentiment,
    pub positive: f32,
    pub negative: f32,
    /// Utterance contains abusive language
    pub abusive: bool,
}

/// Word-list sentiment analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Classify `text`. A side wins when its score beats the other side
    /// and clears `threshold`; everything else is neutral.
    pub fn analyze(&self, text: &str, threshold: f32) -> SentimentScore {
        let lowered = text.to_lowercase();
        let mut positive = 0.0f32;
        let mut negative = 0.0f32;
        let mut abusive = false;

        for word in lowered.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            if POSITIVE_WORDS.contains(word) {
                positive += WORD_WEIGHT;
            }
            if NEGATIVE_WORDS.contains(word) {
                negative += WORD_WEIGHT;
            }
            if ABUSIVE_WORDS.contains(word) {
                abusive = true;
            }
        }

        positive = positive.min(1.0);
        negative = negative.min(1.0);

        let sentiment = if negative > positive && negative >= threshold {
            Sentiment::Negative
        } else if positive > negative && positive >= threshold {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        };

        SentimentScore {
            sentiment,
            positive,
            negative,
            abusive,
        }
    }
}
