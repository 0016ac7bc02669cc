//! Request and response types for the upstream clients

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dimension every embedding must have
pub const EMBEDDING_DIM: usize = 384;

/// Role of a chat message sent to the LLM
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// End user
    User,
    /// Prior assistant output
    Assistant,
}

/// One chat message in a generation request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role
    pub role: ChatRole,
    /// Message text
    pub text: String,
}

impl ChatMessage {
    /// Create a user message
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, text: text.into() }
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, text: text.into() }
    }
}

/// A non-streaming generation request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// System prompt, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation turns
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl GenerateRequest {
    /// Request with messages only
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { system: None, messages, max_tokens: 1024 }
    }

    /// Builder: set the system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Builder: set max tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Response body of a generation call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Generated text
    pub text: String,
}

/// Request body of an embedding call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// Text to embed
    pub input: String,
}

/// Response body of an embedding call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbedResponse {
    /// Embedding vector, [`EMBEDDING_DIM`] wide
    pub embedding: Vec<f32>,
}

/// One match returned by the vector store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Chunk id in the store
    pub chunk_id: String,
    /// Raw similarity score in [0, 1]
    pub score: f32,
    /// Chunk metadata; chunk text travels in `metadata["text"]`
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl VectorMatch {
    /// Chunk text, when present in metadata.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.metadata.get("text").and_then(serde_json::Value::as_str)
    }
}

/// Request body of a vector query
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorQueryRequest {
    /// Namespace to search
    pub namespace: String,
    /// Query vector
    pub vector: Vec<f32>,
    /// Result depth
    pub top_k: u16,
    /// Metadata filter, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<HashMap<String, serde_json::Value>>,
}

/// Response body of a vector query
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorQueryResponse {
    /// Matches ordered by score descending
    pub matches: Vec<VectorMatch>,
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_builder() {
        let request = GenerateRequest::new(vec![ChatMessage::user("hi")])
            .with_system("You are a support agent")
            .with_max_tokens(256);
        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.system.as_deref(), Some("You are a support agent"));
    }

    #[test]
    fn test_vector_match_text_accessor() {
        let mut metadata = HashMap::new();
        metadata.insert("text".to_string(), serde_json::json!("refund policy chunk"));
        let m = VectorMatch { chunk_id: "c1".to_string(), score: 0.8, metadata };
        assert_eq!(m.text(), Some("refund policy chunk"));

        let empty = VectorMatch {
            chunk_id: "c2".to_string(),
            score: 0.5,
            metadata: HashMap::new(),
        };
        assert_eq!(empty.text(), None);
    }
}
