//! Scripted upstream mocks: LLM, embeddings, vector store.

use async_trait::async_trait;
use convergeai_llm::{
    EmbeddingsClient, GenerateRequest, LlmClient, UpstreamError, VectorMatch, EMBEDDING_DIM,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// LLM mock that replays scripted responses in order, falling back to a
/// default once the script runs out.
pub struct MockLlmClient {
    script: Mutex<VecDeque<String>>,
    default_reply: String,
    fail: AtomicBool,
}

impl MockLlmClient {
    /// Mock that always answers `default_reply`.
    #[must_use]
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: default_reply.into(),
            fail: AtomicBool::new(false),
        }
    }

    /// Queue a scripted response.
    pub fn push_response(&self, response: impl Into<String>) {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(response.into());
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, _request: GenerateRequest) -> Result<String, UpstreamError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::ApiError {
                status: 503,
                message: "scripted failure".to_string(),
            });
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        Ok(next.unwrap_or_else(|| self.default_reply.clone()))
    }
}

/// Deterministic embeddings: a hash-seeded unit-ish vector per input.
#[derive(Default)]
pub struct MockEmbeddings {
    fail: AtomicBool,
}

impl MockEmbeddings {
    /// Working mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingsClient for MockEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::RequestFailed("scripted failure".to_string()));
        }
        let mut seed = 0u64;
        for byte in text.bytes() {
            seed = seed.wrapping_mul(31).wrapping_add(u64::from(byte));
        }
        Ok((0..EMBEDDING_DIM)
            .map(|i| {
                let v = seed.wrapping_add(i as u64).wrapping_mul(6_364_136_223_846_793_005);
                (v % 1000) as f32 / 1000.0
            })
            .collect())
    }
}

/// Vector store mock with per-namespace seeded matches.
#[derive(Default)]
pub struct MockVectorStore {
    namespaces: Mutex<HashMap<String, Vec<VectorMatch>>>,
    fail: AtomicBool,
}

impl MockVectorStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one chunk into a namespace.
    pub fn seed_chunk(&self, namespace: &str, chunk_id: &str, score: f32, text: &str) {
        let mut metadata = HashMap::new();
        metadata.insert("text".to_string(), serde_json::json!(text));
        self.namespaces
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(namespace.to_string())
            .or_default()
            .push(VectorMatch { chunk_id: chunk_id.to_string(), score, metadata });
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl convergeai_llm::VectorStore for MockVectorStore {
    async fn query(
        &self,
        namespace: &str,
        _vector: Vec<f32>,
        top_k: u16,
        _filter: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<Vec<VectorMatch>, UpstreamError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::ApiError {
                status: 503,
                message: "scripted failure".to_string(),
            });
        }
        let namespaces = self
            .namespaces
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut matches = namespaces.get(namespace).cloned().unwrap_or_default();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k as usize);
        Ok(matches)
    }
}
