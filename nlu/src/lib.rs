//! # ConvergeAI NLU
//!
//! Deterministic language understanding for the dialog core: a weighted
//! rule-table intent classifier, regex entity extraction, confirmation and
//! workflow-cancellation token matching, and a lexicon sentiment scorer.
//!
//! Everything here is pure and clock-injected, which keeps every routing
//! decision reproducible in tests. An LLM may *supplement* classification
//! upstream, but all state transitions in the core depend only on this
//! module's deterministic output.

pub mod classifier;
pub mod entities;
pub mod intent;
pub mod sentiment;

pub use classifier::{
    is_affirmative, is_workflow_cancellation, Classification, IntentClassifier,
    CONFIDENCE_FLOOR,
};
pub use entities::{extract, parse_bare_quantity, Entities};
pub use intent::Intent;
pub use sentiment::sentiment_score;
