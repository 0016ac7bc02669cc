//! Rule-based intent classifier.
//!
//! A weighted regex table scores every intent; the best score becomes the
//! confidence. Anything under the confidence floor is returned as `other`
//! with the `low_confidence` flag set so the coordinator can ask for
//! clarification. Classification is stateless with respect to the session:
//! while a workflow is active the engine handles the turn instead, unless
//! the utterance is a workflow-cancellation pattern.

use crate::entities::{extract, Entities};
use crate::intent::Intent;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Confidence floor under which the classifier answers `other`.
pub const CONFIDENCE_FLOOR: f32 = 0.5;

/// Classification result for one utterance
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    /// Best-scoring intent
    pub intent: Intent,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Extracted entities
    pub entities: Entities,
    /// Set when the raw best score fell under the floor
    pub low_confidence: bool,
}

struct Rule {
    intent: Intent,
    pattern: &'static LazyLock<Regex>,
    weight: f32,
}

macro_rules! pattern {
    ($name:ident, $re:literal) => {
        #[allow(clippy::unwrap_used)] // Patterns are compile-time constants
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).unwrap());
    };
}

pattern!(GREETING, r"(?i)^\s*(hi|hii+|hello|hey|yo|good\s+(morning|afternoon|evening)|namaste)\b");
pattern!(BOOK_VERB, r"(?i)\b(book|re-?book|reserve|schedule\s+a)\b");
pattern!(BOOK_NEED, r"(?i)\b(need|want|get|looking\s+for|send)\b.{0,40}\b(repair|service|servicing|clean|cleaning|installation|install|plumb\w*|electric\w*|carpent\w*|paint\w*|pest|salon|massage|ac|geyser|sofa)\b");
pattern!(RESCHEDULE, r"(?i)\b(re-?schedul\w*|postpone|prepone|move\s+my\s+(booking|appointment)|change\s+(the\s+)?(date|time|slot))\b");
pattern!(CANCEL_BOOKING, r"(?i)\bcancel\b.{0,30}\b(booking|order|appointment|service|it)\b");
pattern!(CANCEL_BARE, r"(?i)\bcancel(lation)?\b");
pattern!(COMPLAINT, r"(?i)\b(complain\w*|unhappy|disappointed|issue|problem|damaged|broke|broken|rude|misbehav\w*|no[\s-]?show|never\s+(arrived|came)|refund\s+not|not\s+refunded|pathetic|worst|terrible|horrible)\b");
pattern!(SERVICE_INQUIRY, r"(?i)\b(what\s+services|which\s+services|services\s+(do\s+you|available)|show\s+me|browse|categor\w*|recommend\w*|suggest\w*|options?\s+for)\b");
pattern!(POLICY, r"(?i)\b(polic\w*|terms|conditions|rules|warranty|guarantee|refund\w*)\b");
pattern!(PRICE, r"(?i)\b(price|prices|pricing|cost|costs|how\s+much|rate\s+card|rates|charges?)\b");
pattern!(STATUS, r"(?i)\b(status|where\s+is|track|when\s+(will|is))\b.{0,40}\b(booking|order|provider|technician|service)\b");
pattern!(STATUS_MY, r"(?i)\b(my\s+bookings?|my\s+orders?)\b");

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule { intent: Intent::Greeting, pattern: &GREETING, weight: 0.90 },
        Rule { intent: Intent::Booking, pattern: &BOOK_VERB, weight: 0.80 },
        Rule { intent: Intent::Booking, pattern: &BOOK_NEED, weight: 0.85 },
        Rule { intent: Intent::Reschedule, pattern: &RESCHEDULE, weight: 0.90 },
        Rule { intent: Intent::Cancellation, pattern: &CANCEL_BOOKING, weight: 0.90 },
        Rule { intent: Intent::Cancellation, pattern: &CANCEL_BARE, weight: 0.60 },
        Rule { intent: Intent::Complaint, pattern: &COMPLAINT, weight: 0.80 },
        Rule { intent: Intent::ServiceInquiry, pattern: &SERVICE_INQUIRY, weight: 0.75 },
        Rule { intent: Intent::PolicyInquiry, pattern: &POLICY, weight: 0.82 },
        Rule { intent: Intent::PriceInquiry, pattern: &PRICE, weight: 0.78 },
        Rule { intent: Intent::StatusInquiry, pattern: &STATUS, weight: 0.88 },
        Rule { intent: Intent::StatusInquiry, pattern: &STATUS_MY, weight: 0.70 },
    ]
});

/// Tokens that cancel an active workflow regardless of classification.
const WORKFLOW_CANCEL_PATTERNS: [&str; 5] =
    ["cancel", "stop", "never mind", "nevermind", "forget it"];

/// Affirmative tokens accepted at a confirmation step.
const AFFIRMATIVE_TOKENS: [&str; 6] = ["yes", "y", "confirm", "ok", "sure", "go ahead"];

/// Whether the utterance is a high-confidence workflow cancellation.
///
/// Matched against the whole trimmed utterance so that "cancel my booking"
/// still classifies as a cancellation intent rather than killing the
/// active workflow silently.
#[must_use]
pub fn is_workflow_cancellation(text: &str) -> bool {
    let trimmed = text
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .to_lowercase();
    WORKFLOW_CANCEL_PATTERNS.contains(&trimmed.as_str())
}

/// Whether the utterance is an affirmative confirmation token.
#[must_use]
pub fn is_affirmative(text: &str) -> bool {
    let trimmed = text
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .to_lowercase();
    AFFIRMATIVE_TOKENS.contains(&trimmed.as_str())
}

/// Rule-table intent classifier
#[derive(Clone, Copy, Debug, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    /// Create a classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classify one utterance.
    ///
    /// `today` anchors relative date entities. Scores from multiple matched
    /// rules for the same intent take the maximum plus a small bonus per
    /// extra rule, capped at 0.98.
    #[must_use]
    pub fn classify(&self, text: &str, today: NaiveDate) -> Classification {
        let mut best: Option<(Intent, f32)> = None;
        let mut scores: Vec<(Intent, f32, u32)> = Vec::new();

        for rule in RULES.iter() {
            if !rule.pattern.is_match(text) {
                continue;
            }
            if let Some(entry) = scores.iter_mut().find(|(i, _, _)| *i == rule.intent) {
                entry.1 = entry.1.max(rule.weight);
                entry.2 += 1;
            } else {
                scores.push((rule.intent, rule.weight, 1));
            }
        }

        for (intent, weight, hits) in &scores {
            let score = (weight + 0.05 * (hits - 1) as f32).min(0.98);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((*intent, score));
            }
        }

        let entities = extract(text, today);
        let (intent, confidence) = best.unwrap_or((Intent::Other, 0.0));
        let low_confidence = confidence < CONFIDENCE_FLOOR;
        let intent = if low_confidence { Intent::Other } else { intent };

        debug!(%intent, confidence, low_confidence, "classified utterance");
        Classification { intent, confidence, entities, low_confidence }
    }
}
