//! LLM generation client.
//!
//! The LLM is an opaque collaborator: `generate(system, messages,
//! max_tokens) → text`, non-streaming by contract. The HTTP implementation
//! enforces the configured per-call deadline.

use crate::error::UpstreamError;
use crate::types::{GenerateRequest, GenerateResponse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Default LLM call deadline in milliseconds
pub const DEFAULT_LLM_DEADLINE_MS: u64 = 20_000;

/// Opaque text-generation provider
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for the request.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] for network failures, provider errors and
    /// deadline expiry.
    async fn generate(&self, request: GenerateRequest) -> Result<String, UpstreamError>;
}

/// HTTP LLM client
#[derive(Clone)]
pub struct HttpLlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    deadline: Duration,
}

impl HttpLlmClient {
    /// Create a client with an API key from `LLM_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::MissingApiKey`] if the variable is unset.
    pub fn from_env(api_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| UpstreamError::MissingApiKey("LLM_API_KEY"))?;
        Ok(Self::new(api_url, api_key))
    }

    /// Create a client with an explicit API key.
    #[must_use]
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
            deadline: Duration::from_millis(DEFAULT_LLM_DEADLINE_MS),
        }
    }

    /// Builder: override the per-call deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn post_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<String, UpstreamError> {
        let response = self
            .client
            .post(format!("{}/generate", self.api_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamError::RequestFailed(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json::<GenerateResponse>()
                .await
                .map(|body| body.text)
                .map_err(|e| UpstreamError::ResponseParseFailed(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(UpstreamError::RateLimited),
            StatusCode::UNAUTHORIZED => Err(UpstreamError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(UpstreamError::ApiError { status: status.as_u16(), message: body })
            },
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, UpstreamError> {
        let deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX);
        match tokio::time::timeout(self.deadline, self.post_generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::DeadlineExceeded {
                operation: "llm_generate",
                deadline_ms,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_generate_parses_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(header_exists("authorization"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "text": "You can cancel up to 4 hours before the service."
                })),
            )
            .mount(&server)
            .await;

        let client = HttpLlmClient::new(server.uri(), "test-key");
        let reply = client
            .generate(GenerateRequest::new(vec![ChatMessage::user(
                "What is the cancellation policy?",
            )]))
            .await
            .expect("generate");
        assert!(reply.contains("4 hours"));
    }

    #[tokio::test]
    async fn test_generate_maps_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = HttpLlmClient::new(server.uri(), "test-key");
        let err = client
            .generate(GenerateRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .expect_err("should rate limit");
        assert!(matches!(err, UpstreamError::RateLimited));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_generate_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "slow"}))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let client = HttpLlmClient::new(server.uri(), "test-key")
            .with_deadline(Duration::from_millis(20));
        let err = client
            .generate(GenerateRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .expect_err("should time out");
        assert!(matches!(err, UpstreamError::DeadlineExceeded { .. }));
    }
}
