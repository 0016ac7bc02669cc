//! Embedding client.
//!
//! The embedding model is opaque: `embed(text) → vec<f32>[384]`. The HTTP
//! implementation validates the dimension and enforces its deadline.

use crate::error::UpstreamError;
use crate::types::{EmbedRequest, EmbedResponse, EMBEDDING_DIM};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Default embedding call deadline in milliseconds
pub const DEFAULT_EMBED_DEADLINE_MS: u64 = 2_000;

/// Opaque embedding provider
#[async_trait]
pub trait EmbeddingsClient: Send + Sync {
    /// Embed a text into a [`EMBEDDING_DIM`]-dimensional vector.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] for network failures, provider errors,
    /// deadline expiry and dimension mismatches.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError>;
}

/// HTTP embeddings client
#[derive(Clone)]
pub struct HttpEmbeddingsClient {
    client: Client,
    api_url: String,
    deadline: Duration,
}

impl HttpEmbeddingsClient {
    /// Create a client against the given base URL.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            deadline: Duration::from_millis(DEFAULT_EMBED_DEADLINE_MS),
        }
    }

    /// Builder: override the per-call deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn post_embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let response = self
            .client
            .post(format!("{}/embed", self.api_url))
            .header("content-type", "application/json")
            .json(&EmbedRequest { input: text.to_string() })
            .send()
            .await
            .map_err(|e| UpstreamError::RequestFailed(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .json::<EmbedResponse>()
                    .await
                    .map_err(|e| UpstreamError::ResponseParseFailed(e.to_string()))?;
                if body.embedding.len() == EMBEDDING_DIM {
                    Ok(body.embedding)
                } else {
                    Err(UpstreamError::DimensionMismatch {
                        expected: EMBEDDING_DIM,
                        got: body.embedding.len(),
                    })
                }
            },
            StatusCode::TOO_MANY_REQUESTS => Err(UpstreamError::RateLimited),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(UpstreamError::ApiError { status: status.as_u16(), message: body })
            },
        }
    }
}

#[async_trait]
impl EmbeddingsClient for HttpEmbeddingsClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX);
        match tokio::time::timeout(self.deadline, self.post_embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::DeadlineExceeded { operation: "embed", deadline_ms }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_embed_validates_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": vec![0.1f32; 3]
            })))
            .mount(&server)
            .await;

        let client = HttpEmbeddingsClient::new(server.uri());
        let err = client.embed("ac repair").await.expect_err("wrong dimension");
        assert!(matches!(
            err,
            UpstreamError::DimensionMismatch { expected: EMBEDDING_DIM, got: 3 }
        ));
    }

    #[tokio::test]
    async fn test_embed_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": vec![0.5f32; EMBEDDING_DIM]
            })))
            .mount(&server)
            .await;

        let client = HttpEmbeddingsClient::new(server.uri());
        let vector = client.embed("ac repair").await.expect("embed");
        assert_eq!(vector.len(), EMBEDDING_DIM);
    }
}
