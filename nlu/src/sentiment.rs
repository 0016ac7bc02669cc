//! Lexicon sentiment scoring.
//!
//! Deterministic word-list scorer returning a value in [-1, 1]. Used for
//! complaint priority derivation (thresholds at -0.5 and -0.8) and for the
//! priority queue's sentiment penalty. Negation within two preceding words
//! flips a hit.

use std::collections::HashSet;
use std::sync::LazyLock;

static NEGATIVE: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "angry", "annoyed", "appalling", "awful", "bad", "broken", "careless", "cheated",
        "damaged", "delay", "delayed", "disappointed", "disappointing", "disgusting",
        "dirty", "frustrated", "furious", "horrible", "ignored", "incompetent", "late",
        "lazy", "misbehaved", "nightmare", "pathetic", "poor", "refused", "ridiculous",
        "rude", "scam", "shoddy", "terrible", "unacceptable", "unhappy", "unprofessional",
        "unreliable", "useless", "waste", "worst", "wrong",
    ])
});

static POSITIVE: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "amazing", "appreciate", "awesome", "excellent", "fantastic", "fine", "good",
        "great", "happy", "helpful", "kind", "nice", "perfect", "pleasant", "polite",
        "professional", "prompt", "punctual", "satisfied", "thanks", "thank", "wonderful",
    ])
});

static NEGATIONS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| HashSet::from(["not", "no", "never", "wasnt", "isnt", "didnt", "dont"]));

/// Score the sentiment of `text` in [-1, 1].
///
/// Zero for neutral text or when no lexicon word appears.
#[must_use]
pub fn sentiment_score(text: &str) -> f32 {
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut positive = 0i32;
    let mut negative = 0i32;

    for (i, token) in tokens.iter().enumerate() {
        let negated = tokens[i.saturating_sub(2)..i]
            .iter()
            .any(|t| NEGATIONS.contains(t.as_str()));
        if POSITIVE.contains(token.as_str()) {
            if negated {
                negative += 1;
            } else {
                positive += 1;
            }
        } else if NEGATIVE.contains(token.as_str()) {
            if negated {
                positive += 1;
            } else {
                negative += 1;
            }
        }
    }

    let hits = positive + negative;
    if hits == 0 {
        return 0.0;
    }
    (positive - negative) as f32 / hits as f32
}
