//! # ConvergeAI Retrieval
//!
//! Chunked semantic retrieval for policy grounding: embed the query, search
//! the external vector store, normalize relevance scores, and compute the
//! grounding score that gates retrieval-grounded answers.
//!
//! The scoring functions are pure; only [`RetrievalEngine`] touches the
//! network, and its failures are non-fatal by design (degrade to an empty
//! chunk list and let the caller decide).

pub mod engine;
pub mod scoring;

pub use engine::{
    RetrievalEngine, RetrievedChunk, DEFAULT_TOP_K, POLICY_NAMESPACE, REVIEWS_NAMESPACE,
    SERVICE_NAMESPACE,
};
pub use scoring::{grounding_score, grounding_tokens, normalize_score};
