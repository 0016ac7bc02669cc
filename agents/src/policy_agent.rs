//! Policy agent: retrieval-grounded answering with refusal on low
//! grounding.
//!
//! The LLM produces prose only; whether an answer is emitted at all is
//! decided by the deterministic grounding score against the configured
//! refusal threshold.

use crate::outcome::{Agent, AgentContext, AgentOutcome};
use async_trait::async_trait;
use convergeai_core::config::SharedConfig;
use convergeai_core::error::ErrorKind;
use convergeai_core::types::session::RetrievalProvenance;
use convergeai_llm::{ChatMessage, GenerateRequest, LlmClient};
use convergeai_retrieval::{RetrievalEngine, RetrievedChunk, POLICY_NAMESPACE};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Standard refusal reply when grounding falls under the threshold.
pub const REFUSAL_REPLY: &str =
    "I don't have confident information about that - please contact support.";

/// Chunk ids attached as provenance on a grounded answer.
const PROVENANCE_LIMIT: usize = 3;

/// Token budget for policy answers.
const MAX_ANSWER_TOKENS: u32 = 512;

/// Policy specialist
pub struct PolicyAgent {
    retrieval: Arc<RetrievalEngine>,
    llm: Arc<dyn LlmClient>,
    config: SharedConfig,
}

impl PolicyAgent {
    /// Create the agent over retrieval, the LLM and the shared config.
    #[must_use]
    pub const fn new(
        retrieval: Arc<RetrievalEngine>,
        llm: Arc<dyn LlmClient>,
        config: SharedConfig,
    ) -> Self {
        Self { retrieval, llm, config }
    }

    fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> GenerateRequest {
        let mut excerpt_block = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            excerpt_block.push_str(&format!("[{}] {}\n", i + 1, chunk.text));
        }
        let system = "You are a customer-support assistant for a home-services \
                      marketplace. Answer the question using only the policy excerpts \
                      provided, quoting them verbatim where possible. If the excerpts do \
                      not cover the question, say you are not sure."
            .to_string();
        let user = format!("Policy excerpts:\n{excerpt_block}\nQuestion: {question}");
        GenerateRequest::new(vec![ChatMessage::user(user)])
            .with_system(system)
            .with_max_tokens(MAX_ANSWER_TOKENS)
    }
}

#[async_trait]
impl Agent for PolicyAgent {
    fn name(&self) -> &'static str {
        "policy"
    }

    async fn execute(&self, ctx: &AgentContext) -> AgentOutcome {
        let (top_k, threshold) = {
            let config = self.config.read().await;
            (config.retrieval_top_k, config.grounding_refusal_threshold)
        };

        let chunks = self
            .retrieval
            .retrieve_or_empty(&ctx.utterance, POLICY_NAMESPACE, top_k, None)
            .await;

        if chunks.is_empty() {
            info!("no chunks retrieved, refusing policy answer");
            return AgentOutcome::reply(REFUSAL_REPLY, "policy_refused")
                .with_metadata("grounding_score", Value::from(0.0));
        }

        let answer = match self.llm.generate(Self::build_prompt(&ctx.utterance, &chunks)).await
        {
            Ok(answer) => answer,
            Err(error) => {
                warn!(%error, "llm generation failed for policy answer");
                return AgentOutcome::failed(ErrorKind::Upstream, "policy_llm_failed");
            },
        };

        let reference: Vec<(String, f32)> = chunks
            .iter()
            .map(|c| (c.text.clone(), c.normalized_score))
            .collect();
        let grounding = convergeai_retrieval::grounding_score(&answer, &reference);

        if grounding < threshold {
            info!(grounding, threshold, "grounding under threshold, refusing");
            let mut outcome = AgentOutcome::reply(REFUSAL_REPLY, "policy_refused")
                .with_metadata("grounding_score", Value::from(f64::from(grounding)));
            outcome.grounding_score = Some(grounding);
            return outcome;
        }

        let provenance: Vec<RetrievalProvenance> = chunks
            .iter()
            .take(PROVENANCE_LIMIT)
            .map(|c| RetrievalProvenance {
                doc_id: c.chunk_id.clone(),
                score: c.normalized_score,
            })
            .collect();

        let mut outcome = AgentOutcome::reply(answer, "policy_answered")
            .with_metadata("grounding_score", Value::from(f64::from(grounding)));
        outcome.grounding_score = Some(grounding);
        outcome.provenance = provenance;
        outcome
    }
}
