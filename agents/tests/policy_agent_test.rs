//! Policy agent: grounding gate, refusal, provenance.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code

use chrono::Utc;
use convergeai_agents::{Agent, AgentContext, PolicyAgent, REFUSAL_REPLY};
use convergeai_core::config::{shared, RuntimeConfig};
use convergeai_core::error::ErrorKind;
use convergeai_core::types::ids::{SessionId, UserId};
use convergeai_core::types::session::{Channel, Session, SessionStatus};
use convergeai_llm::{EmbeddingsClient, VectorStore};
use convergeai_nlu::{Entities, Intent};
use convergeai_retrieval::{RetrievalEngine, POLICY_NAMESPACE};
use convergeai_testing::{MockEmbeddings, MockLlmClient, MockVectorStore};
use std::sync::Arc;

struct World {
    agent: PolicyAgent,
    llm: Arc<MockLlmClient>,
    vectors: Arc<MockVectorStore>,
    embeddings: Arc<MockEmbeddings>,
}

fn world() -> World {
    let embeddings = Arc::new(MockEmbeddings::new());
    let vectors = Arc::new(MockVectorStore::new());
    let llm = Arc::new(MockLlmClient::new("I am not sure."));
    let retrieval = Arc::new(RetrievalEngine::new(
        Arc::clone(&embeddings) as Arc<dyn EmbeddingsClient>,
        Arc::clone(&vectors) as Arc<dyn VectorStore>,
    ));
    let agent = PolicyAgent::new(
        retrieval,
        Arc::clone(&llm) as Arc<dyn convergeai_llm::LlmClient>,
        shared(RuntimeConfig::default()),
    );
    World { agent, llm, vectors, embeddings }
}

fn ctx(utterance: &str) -> AgentContext {
    let now = Utc::now();
    AgentContext {
        session: Session {
            session_id: SessionId::generate(),
            user_ref: UserId::new(1),
            channel: Channel::Web,
            status: SessionStatus::Open,
            active_workflow: None,
            created_at: now,
            last_activity_at: now,
        },
        user_ref: UserId::new(1),
        intent: Intent::PolicyInquiry,
        entities: Entities::default(),
        utterance: utterance.to_string(),
        today: now.date_naive(),
    }
}

#[tokio::test]
async fn test_strong_grounding_answers_with_provenance() {
    let world = world();
    world.vectors.seed_chunk(
        POLICY_NAMESPACE,
        "chunk-1",
        0.82,
        "Cancellation policy: 100% refund if cancelled more than 4 hours before the service.",
    );
    world.vectors.seed_chunk(
        POLICY_NAMESPACE,
        "chunk-2",
        0.70,
        "A 50% refund applies between 2 and 4 hours before the service.",
    );
    world.vectors.seed_chunk(
        POLICY_NAMESPACE,
        "chunk-3",
        0.65,
        "No refund is issued within 2 hours of the service window.",
    );
    world
        .llm
        .push_response("You receive a 100% refund if cancelled more than 4 hours before the service.");

    let outcome = world
        .agent
        .execute(&ctx("What is your cancellation policy?"))
        .await;

    assert_eq!(outcome.action_taken, "policy_answered");
    assert!(outcome.reply_text.contains("100% refund"));
    let grounding = outcome.grounding_score.expect("grounding attached");
    assert!(grounding >= 0.60, "expected grounded answer, got {grounding}");
    // Top-3 chunk ids as provenance, in relevance order.
    assert_eq!(outcome.provenance.len(), 3);
    assert_eq!(outcome.provenance[0].doc_id, "chunk-1");
    assert!((outcome.provenance[0].score - 0.964).abs() < 1e-3);
    assert_eq!(outcome.error, None);
}

#[tokio::test]
async fn test_weak_grounding_refuses_without_provenance() {
    let world = world();
    world.vectors.seed_chunk(
        POLICY_NAMESPACE,
        "chunk-9",
        0.55,
        "Installation warranty coverage lasts ninety days from completion.",
    );
    world.llm.push_response(
        "Refunds for older services are handled manually with discretionary approval.",
    );

    let outcome = world
        .agent
        .execute(&ctx("Can I get a refund for a service 3 weeks ago?"))
        .await;

    assert_eq!(outcome.action_taken, "policy_refused");
    assert_eq!(outcome.reply_text, REFUSAL_REPLY);
    assert!(outcome.provenance.is_empty());
    let grounding = outcome.grounding_score.expect("grounding attached");
    assert!(grounding < 0.60);
}

#[tokio::test]
async fn test_retrieval_failure_degrades_to_refusal() {
    let world = world();
    world.embeddings.set_failing(true);

    let outcome = world.agent.execute(&ctx("What is the cancellation policy?")).await;
    assert_eq!(outcome.action_taken, "policy_refused");
    assert_eq!(outcome.reply_text, REFUSAL_REPLY);
    assert!(outcome.provenance.is_empty());
}

#[tokio::test]
async fn test_llm_failure_is_upstream_error() {
    let world = world();
    world.vectors.seed_chunk(POLICY_NAMESPACE, "chunk-1", 0.82, "Cancellation policy text.");
    world.llm.set_failing(true);

    let outcome = world.agent.execute(&ctx("What is the cancellation policy?")).await;
    assert_eq!(outcome.error, Some(ErrorKind::Upstream));
    assert!(outcome.reply_text.is_empty());
}

#[tokio::test]
async fn test_grounding_exactly_at_threshold_is_accepted() {
    // The refusal threshold is inclusive on the upper side: a score of
    // exactly 0.60 answers.
    let world = world();
    // Five countable answer tokens, three grounded but non-adjacent runs
    // under three tokens, no boost (normalized 0.90 < 0.95):
    // 3/5 = 0.60 exactly.
    world.vectors.seed_chunk(POLICY_NAMESPACE, "c", 0.60, "refund window policy");
    world
        .llm
        .push_response("refund elephants window giraffes policy");

    let outcome = world.agent.execute(&ctx("refund policy please")).await;
    let grounding = outcome.grounding_score.expect("grounding attached");
    assert!((grounding - 0.60).abs() < 1e-6, "expected exactly 0.60, got {grounding}");
    assert_eq!(outcome.action_taken, "policy_answered");
}
