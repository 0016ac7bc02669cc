//! Vector store client.
//!
//! The vector database is opaque: `query(namespace, vec, k, filter) →
//! [(chunk_id, score, metadata)]`. Namespaces in use: `documents`
//! (policy), `service-descriptions`, `reviews`.

use crate::error::UpstreamError;
use crate::types::{VectorMatch, VectorQueryRequest, VectorQueryResponse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::time::Duration;

/// Default vector query deadline in milliseconds
pub const DEFAULT_VECTOR_DEADLINE_MS: u64 = 3_000;

/// Opaque vector search provider
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Query a namespace for the `top_k` nearest chunks.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] for network failures, provider errors and
    /// deadline expiry.
    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: u16,
        filter: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<VectorMatch>, UpstreamError>;
}

/// HTTP vector store client
#[derive(Clone)]
pub struct HttpVectorStore {
    client: Client,
    api_url: String,
    deadline: Duration,
}

impl HttpVectorStore {
    /// Create a client against the given base URL.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            deadline: Duration::from_millis(DEFAULT_VECTOR_DEADLINE_MS),
        }
    }

    /// Builder: override the per-call deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn post_query(
        &self,
        request: &VectorQueryRequest,
    ) -> Result<Vec<VectorMatch>, UpstreamError> {
        let response = self
            .client
            .post(format!("{}/query", self.api_url))
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamError::RequestFailed(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json::<VectorQueryResponse>()
                .await
                .map(|body| body.matches)
                .map_err(|e| UpstreamError::ResponseParseFailed(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(UpstreamError::RateLimited),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(UpstreamError::ApiError { status: status.as_u16(), message: body })
            },
        }
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: u16,
        filter: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<VectorMatch>, UpstreamError> {
        let request = VectorQueryRequest {
            namespace: namespace.to_string(),
            vector,
            top_k,
            filter,
        };
        let deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX);
        match tokio::time::timeout(self.deadline, self.post_query(&request)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::DeadlineExceeded {
                operation: "vector_query",
                deadline_ms,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_query_returns_matches_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(serde_json::json!({"namespace": "documents"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "matches": [
                    {"chunk_id": "c1", "score": 0.82, "metadata": {"text": "refunds"}},
                    {"chunk_id": "c2", "score": 0.71, "metadata": {"text": "cancellation"}}
                ]
            })))
            .mount(&server)
            .await;

        let store = HttpVectorStore::new(server.uri());
        let matches = store
            .query("documents", vec![0.0; 4], 7, None)
            .await
            .expect("query");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].chunk_id, "c1");
        assert_eq!(matches[0].text(), Some("refunds"));
    }

    #[tokio::test]
    async fn test_query_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let store = HttpVectorStore::new(server.uri());
        let err = store
            .query("documents", vec![0.0; 4], 7, None)
            .await
            .expect_err("should fail");
        assert!(matches!(err, UpstreamError::ApiError { status: 503, .. }));
        assert!(err.is_transient());
    }
}
