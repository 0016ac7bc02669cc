//! # ConvergeAI Upstream Clients
//!
//! Clients for the three opaque collaborators of the core: the LLM
//! (`generate(prompt) → text`), the embedding model (`embed(text) →
//! vec<f32>[384]`) and the vector database (`query(namespace, vec, k,
//! filter)`). Each collaborator is a trait so the core never depends on a
//! concrete provider; the HTTP implementations here enforce the per-call
//! deadlines from the concurrency model (embed 2 s, vector query 3 s,
//! LLM 20 s).
//!
//! ## Example
//!
//! ```no_run
//! use convergeai_llm::{GenerateRequest, ChatMessage, HttpLlmClient, LlmClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpLlmClient::from_env("https://llm.internal/v1")?;
//!     let reply = client
//!         .generate(GenerateRequest::new(vec![ChatMessage::user("Hello!")]))
//!         .await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod embeddings;
pub mod error;
pub mod types;
pub mod vector;

pub use client::{HttpLlmClient, LlmClient, DEFAULT_LLM_DEADLINE_MS};
pub use embeddings::{EmbeddingsClient, HttpEmbeddingsClient, DEFAULT_EMBED_DEADLINE_MS};
pub use error::UpstreamError;
pub use types::{
    ChatMessage, ChatRole, EmbedRequest, EmbedResponse, GenerateRequest, GenerateResponse,
    VectorMatch, VectorQueryRequest, VectorQueryResponse, EMBEDDING_DIM,
};
pub use vector::{HttpVectorStore, VectorStore, DEFAULT_VECTOR_DEADLINE_MS};
