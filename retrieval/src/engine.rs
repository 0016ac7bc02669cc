//! Retrieval engine: embed the query, search the vector store, normalize.

use crate::scoring::normalize_score;
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_llm::{EmbeddingsClient, UpstreamError, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Default retrieval depth
pub const DEFAULT_TOP_K: u16 = 7;

/// Namespace holding policy documents
pub const POLICY_NAMESPACE: &str = "documents";

/// Namespace holding service descriptions
pub const SERVICE_NAMESPACE: &str = "service-descriptions";

/// Namespace holding review snippets
pub const REVIEWS_NAMESPACE: &str = "reviews";

/// A retrieved chunk with both raw and normalized relevance.
///
/// The raw score is kept alongside because normalized values are not
/// comparable to raw cosine similarity.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedChunk {
    /// Chunk id in the external store
    pub chunk_id: String,
    /// Provider-reported similarity in [0, 1]
    pub raw_score: f32,
    /// Normalized relevance
    pub normalized_score: f32,
    /// Chunk text; empty when the store returned none
    pub text: String,
    /// Remaining chunk metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Embeds queries and searches the external vector store
pub struct RetrievalEngine {
    embeddings: Arc<dyn EmbeddingsClient>,
    vectors: Arc<dyn VectorStore>,
}

impl RetrievalEngine {
    /// Create an engine over the two upstream clients.
    #[must_use]
    pub fn new(embeddings: Arc<dyn EmbeddingsClient>, vectors: Arc<dyn VectorStore>) -> Self {
        Self { embeddings, vectors }
    }

    /// Retrieve the `top_k` chunks for `query` from `namespace`.
    ///
    /// Results keep the store's relevance ordering; normalization is
    /// monotone so it never reorders them.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingFailed`, `VectorStoreUnavailable` or
    /// `DeadlineExceeded` on upstream failure.
    pub async fn retrieve(
        &self,
        query: &str,
        namespace: &str,
        top_k: u16,
        filter: Option<HashMap<String, serde_json::Value>>,
    ) -> CoreResult<Vec<RetrievedChunk>> {
        let vector = self
            .embeddings
            .embed(query)
            .await
            .map_err(|e| map_upstream(e, "embed"))?;

        let matches = self
            .vectors
            .query(namespace, vector, top_k, filter)
            .await
            .map_err(|e| map_upstream(e, "vector_query"))?;

        Ok(matches
            .into_iter()
            .map(|m| {
                let text = m.text().unwrap_or_default().to_string();
                RetrievedChunk {
                    normalized_score: normalize_score(m.score),
                    raw_score: m.score,
                    chunk_id: m.chunk_id,
                    text,
                    metadata: m.metadata,
                }
            })
            .collect())
    }

    /// Retrieval with non-fatal failure semantics: upstream errors are
    /// logged and degrade to an empty list, leaving the caller to decide
    /// (the policy agent refuses on low grounding; others degrade
    /// gracefully).
    pub async fn retrieve_or_empty(
        &self,
        query: &str,
        namespace: &str,
        top_k: u16,
        filter: Option<HashMap<String, serde_json::Value>>,
    ) -> Vec<RetrievedChunk> {
        match self.retrieve(query, namespace, top_k, filter).await {
            Ok(chunks) => chunks,
            Err(error) => {
                warn!(%error, namespace, "retrieval failed, degrading to empty result");
                Vec::new()
            },
        }
    }
}

fn map_upstream(error: UpstreamError, stage: &str) -> CoreError {
    match error {
        UpstreamError::DeadlineExceeded { operation, .. } => {
            CoreError::DeadlineExceeded { operation: operation.to_string() }
        },
        other if stage == "embed" => CoreError::EmbeddingFailed(other.to_string()),
        other => CoreError::VectorStoreUnavailable(other.to_string()),
    }
}
