//! Relevance normalization and grounding scoring.
//!
//! Both functions are pure so the grounding gate can be property-tested
//! without mocking any provider.

/// Piecewise-linear score normalization.
//
// Dense-retrieval raw scores in the typical relevant range 0.60–0.85 map
// into [0.90, 1.00]; below 0.60 the score passes through unchanged. The
// normalized values are not comparable to raw cosine similarity.
#[must_use]
pub fn normalize_score(raw: f32) -> f32 {
    if raw >= 0.75 {
        0.95 + (raw - 0.75) * 0.20
    } else if raw >= 0.60 {
        0.90 + (raw - 0.60) * (1.0 / 3.0)
    } else {
        raw
    }
}

/// Minimum token length counted by the grounding scorer.
const MIN_TOKEN_LEN: usize = 4;

/// Run length at and above which matched tokens weigh 1.5×.
const SPAN_LEN: usize = 3;

/// Weight of a token inside a qualifying span.
const SPAN_WEIGHT: f32 = 1.5;

/// Boost applied when at least one chunk is highly relevant.
const HIGH_RELEVANCE_BOOST: f32 = 1.1;

/// Normalized score at and above which a chunk counts as highly relevant.
const HIGH_RELEVANCE_THRESHOLD: f32 = 0.95;

/// Lowercase, punctuation-stripped tokens of length ≥ 4.
#[must_use]
pub fn grounding_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of answer tokens textually supported by the retrieved chunks.
///
/// Matched tokens inside runs of ≥ 3 consecutive matches weigh 1.5× a
/// single-token match. If any chunk's normalized score is ≥ 0.95 the result
/// is boosted by 1.1. The final value is capped at 1.0.
///
/// `chunks` provides `(text, normalized_score)` pairs.
#[must_use]
pub fn grounding_score(answer: &str, chunks: &[(String, f32)]) -> f32 {
    let answer_tokens = grounding_tokens(answer);
    if answer_tokens.is_empty() || chunks.is_empty() {
        return 0.0;
    }

    let reference: std::collections::HashSet<String> = chunks
        .iter()
        .flat_map(|(text, _)| grounding_tokens(text))
        .collect();

    let matched: Vec<bool> = answer_tokens
        .iter()
        .map(|t| reference.contains(t))
        .collect();

    let mut weighted = 0.0f32;
    let mut i = 0;
    while i < matched.len() {
        if matched[i] {
            let mut run = i;
            while run < matched.len() && matched[run] {
                run += 1;
            }
            let len = run - i;
            let weight = if len >= SPAN_LEN { SPAN_WEIGHT } else { 1.0 };
            weighted += weight * len as f32;
            i = run;
        } else {
            i += 1;
        }
    }

    let mut score = weighted / answer_tokens.len() as f32;
    if chunks.iter().any(|(_, norm)| *norm >= HIGH_RELEVANCE_THRESHOLD) {
        score *= HIGH_RELEVANCE_BOOST;
    }
    score.min(1.0)
}

#[cfg(test)]
#[allow(clippy::float_cmp)] // Exact schedule points are part of the contract
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_schedule_points() {
        assert_eq!(normalize_score(0.0), 0.0);
        assert_eq!(normalize_score(0.59), 0.59);
        assert!((normalize_score(0.60) - 0.90).abs() < 1e-6);
        assert!((normalize_score(0.75) - 0.95).abs() < 1e-6);
        assert!((normalize_score(0.82) - 0.964).abs() < 1e-6);
        assert!((normalize_score(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_grounding_tokens_normalization() {
        let tokens = grounding_tokens("Refunds, when CANCELLED early, are 100% covered!");
        assert_eq!(tokens, vec!["refunds", "when", "cancelled", "early", "covered"]);
    }

    #[test]
    fn test_grounding_empty_inputs() {
        assert_eq!(grounding_score("", &[("policy text".to_string(), 0.9)]), 0.0);
        assert_eq!(grounding_score("an answer with words", &[]), 0.0);
    }

    #[test]
    fn test_grounding_span_weighting() {
        let chunks = vec![(
            "full refund when cancelled more than four hours before the service".to_string(),
            0.90,
        )];
        // All five countable tokens match in one run: weight 1.5 each, capped.
        let grounded = grounding_score("full refund when cancelled more hours", &chunks);
        assert_eq!(grounded, 1.0);

        // A single matched token among many unmatched ones weighs 1.0.
        let sparse = grounding_score(
            "elephants sometimes consider quantum refund dilemmas carefully",
            &chunks,
        );
        assert!(sparse > 0.0 && sparse < 0.5);
    }

    #[test]
    fn test_grounding_boost_applies_above_threshold() {
        let answer = "weather considerations notwithstanding refund granted";
        let low = vec![("refund granted".to_string(), 0.94)];
        let high = vec![("refund granted".to_string(), 0.95)];
        let without = grounding_score(answer, &low);
        let with = grounding_score(answer, &high);
        assert!(with > without);
        assert!((with / without - HIGH_RELEVANCE_BOOST).abs() < 1e-5);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_monotone(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(normalize_score(lo) <= normalize_score(hi) + 1e-6);
        }

        #[test]
        fn prop_normalize_maps_unit_interval(raw in 0.0f32..=1.0) {
            let normalized = normalize_score(raw);
            prop_assert!((0.0..=1.0 + 1e-6).contains(&normalized));
        }

        #[test]
        fn prop_grounding_in_unit_interval(
            answer in "[a-z]{1,8}( [a-z]{1,8}){0,20}",
            chunk in "[a-z]{1,8}( [a-z]{1,8}){0,40}",
            norm in 0.0f32..=1.0,
        ) {
            let score = grounding_score(&answer, &[(chunk, norm)]);
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
