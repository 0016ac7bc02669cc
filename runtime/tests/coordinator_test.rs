//! End-to-end turns through the coordinator pipeline.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code

use convergeai_agents::{
    AgentSet, BookingAgent, CancellationAgent, ComplaintAgent, PolicyAgent,
    ServiceDiscoveryAgent, WorkflowDeps, WorkflowEngine,
};
use convergeai_core::clock::Clock;
use convergeai_core::config::{shared, Deadlines, PolicyTables, RuntimeConfig};
use convergeai_core::error::CoreError;
use convergeai_core::repo::{
    AddressRepo, AuditRepo, BookingRepo, CatalogRepo, ComplaintRepo, Page, SessionRepo,
};
use convergeai_core::types::ids::UserId;
use convergeai_core::types::money::Money;
use convergeai_core::types::session::{Channel, Role};
use convergeai_llm::{EmbeddingsClient, LlmClient, VectorStore};
use convergeai_retrieval::{RetrievalEngine, POLICY_NAMESPACE};
use convergeai_runtime::{Coordinator, SessionStore, TurnRequest, TurnResponse};
use convergeai_testing::{
    standard_catalog, CatalogFixture, FixedClock, InMemoryAuditRepo, InMemoryBookingRepo,
    InMemoryCatalogRepo, InMemoryComplaintRepo, InMemorySessionRepo, MockEmbeddings,
    MockLlmClient, MockVectorStore,
};
use std::sync::Arc;

struct World {
    coordinator: Arc<Coordinator>,
    sessions: Arc<InMemorySessionRepo>,
    bookings: Arc<InMemoryBookingRepo>,
    catalog: Arc<InMemoryCatalogRepo>,
    llm: Arc<MockLlmClient>,
    vectors: Arc<MockVectorStore>,
    fixture: CatalogFixture,
}

async fn world() -> World {
    let (catalog, addresses, fixture) = standard_catalog().await;
    let sessions = Arc::new(InMemorySessionRepo::new());
    let bookings = Arc::new(InMemoryBookingRepo::new());
    let complaints = Arc::new(InMemoryComplaintRepo::new());
    let audit = Arc::new(InMemoryAuditRepo::new());
    let clock = Arc::new(FixedClock::monday_morning());
    let config = shared(RuntimeConfig::default());

    let deps = Arc::new(WorkflowDeps {
        catalog: Arc::clone(&catalog) as Arc<dyn CatalogRepo>,
        addresses: addresses as Arc<dyn AddressRepo>,
        bookings: Arc::clone(&bookings) as Arc<dyn BookingRepo>,
        complaints: complaints as Arc<dyn ComplaintRepo>,
        clock: Arc::clone(&clock) as Arc<dyn Clock>,
        policies: PolicyTables::default(),
    });
    let engine = Arc::new(WorkflowEngine::new(Arc::clone(&deps)));

    let embeddings = Arc::new(MockEmbeddings::new());
    let vectors = Arc::new(MockVectorStore::new());
    let llm = Arc::new(MockLlmClient::new("I am not sure."));
    let retrieval = Arc::new(RetrievalEngine::new(
        embeddings as Arc<dyn EmbeddingsClient>,
        Arc::clone(&vectors) as Arc<dyn VectorStore>,
    ));

    let agents = AgentSet {
        booking: Arc::new(BookingAgent::new(Arc::clone(&engine))),
        cancellation: Arc::new(CancellationAgent::new(Arc::clone(&engine))),
        complaint: Arc::new(ComplaintAgent::new(Arc::clone(&engine))),
        service_discovery: Arc::new(ServiceDiscoveryAgent::new(
            Arc::clone(&catalog) as Arc<dyn CatalogRepo>
        )),
        policy: Arc::new(PolicyAgent::new(
            retrieval,
            Arc::clone(&llm) as Arc<dyn LlmClient>,
            Arc::clone(&config),
        )),
    };

    let store = Arc::new(SessionStore::new(
        Arc::clone(&sessions) as Arc<dyn SessionRepo>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::clone(&config),
    ));
    let coordinator = Arc::new(Coordinator::new(
        store,
        engine,
        agents,
        audit as Arc<dyn AuditRepo>,
        clock as Arc<dyn Clock>,
        Deadlines::default(),
    ));

    World { coordinator, sessions, bookings, catalog, llm, vectors, fixture }
}

impl World {
    async fn turn(&self, session: Option<&TurnResponse>, text: &str) -> TurnResponse {
        self.coordinator
            .handle_turn(TurnRequest {
                session_id: session.map(|r| r.session_id.as_str().to_string()),
                user_ref: UserId::new(1),
                text: text.to_string(),
                channel: Channel::Web,
            })
            .await
            .expect("turn")
    }
}

#[tokio::test]
async fn test_greeting_mints_session_and_replies() {
    let world = world().await;
    let response = world.turn(None, "hi").await;
    assert_eq!(response.intent.as_deref(), Some("greeting"));
    assert!(response.reply_text.contains("book"));
    assert!(!response.workflow_active);
    assert_eq!(world.sessions.session_count().await, 1);

    let history = world
        .sessions
        .history(&response.session_id, Page::first(10))
        .await
        .expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_greenfield_booking_end_to_end() {
    let world = world().await;

    let r = world.turn(None, "hi").await;
    assert_eq!(r.intent.as_deref(), Some("greeting"));

    let r = world.turn(Some(&r), "I need AC repair tomorrow at 2pm").await;
    assert_eq!(r.intent.as_deref(), Some("booking"));
    assert!(r.workflow_active);
    assert!(r.reply_text.contains("Standard"));

    // Workflow turns skip classification entirely.
    let r = world.turn(Some(&r), "standard").await;
    assert_eq!(r.intent, None);
    assert!(r.reply_text.to_lowercase().contains("how many units"));

    let r = world.turn(Some(&r), "1").await;
    let r = world.turn(Some(&r), "my home address").await;
    let r = world.turn(Some(&r), "no").await;
    assert!(r.reply_text.contains("499.00"));
    assert!(r.workflow_active);

    let r = world.turn(Some(&r), "yes").await;
    assert!(!r.workflow_active, "workflow cleared after commit");
    assert!(r.reply_text.contains("BKG-"));

    // One booking, one item, total equals the unit price.
    assert_eq!(world.bookings.booking_count().await, 1);
    let bookings = world
        .bookings
        .list_for_user(UserId::new(1), Page::first(5))
        .await
        .expect("list");
    let items = world.bookings.items(bookings[0].id).await.expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(bookings[0].total, Money::from_minor(49_900));

    // Session workflow slot is empty again.
    let workflow = world
        .sessions
        .load_workflow(&r.session_id)
        .await
        .expect("load workflow");
    assert!(workflow.is_none());

    // 7 turns, strictly alternating user/assistant.
    let history = world
        .sessions
        .history(&r.session_id, Page::first(50))
        .await
        .expect("history");
    assert_eq!(history.len(), 14);
    for pair in history.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
    }
}

#[tokio::test]
async fn test_unserviceable_commit_clears_workflow() {
    let world = world().await;
    let r = world.turn(None, "I need AC repair tomorrow at 2pm").await;
    let r = world.turn(Some(&r), "standard").await;
    let r = world.turn(Some(&r), "1").await;
    let r = world.turn(Some(&r), "my home address").await;
    let r = world.turn(Some(&r), "no").await;

    world
        .catalog
        .remove_coverage(world.fixture.ac_repair, &world.fixture.serviced_pincode)
        .await;

    let r = world.turn(Some(&r), "yes").await;
    assert!(r.reply_text.contains("not yet serviced"));
    assert!(!r.workflow_active);
    assert_eq!(world.bookings.booking_count().await, 0);
}

#[tokio::test]
async fn test_concurrent_turns_same_session_serialize() {
    let world = world().await;
    let r = world.turn(None, "I need AC repair tomorrow").await;
    let r = world.turn(Some(&r), "standard").await;
    assert!(r.workflow_active);

    // Two near-simultaneous turns: one supplies the quantity, the other
    // the preferred time. The per-session mutex serializes them.
    let (a, b) = tokio::join!(
        world.turn(Some(&r), "2 units"),
        world.turn(Some(&r), "at 3pm"),
    );

    let workflow = world
        .sessions
        .load_workflow(&r.session_id)
        .await
        .expect("load workflow")
        .expect("workflow still active");
    match workflow {
        convergeai_core::types::workflow::WorkflowState::BookingDraft(draft) => {
            assert_eq!(draft.quantity, Some(2), "turn A's slot persisted");
            assert_eq!(
                draft.preferred_time,
                chrono::NaiveTime::from_hms_opt(15, 0, 0),
                "turn B's slot persisted"
            );
        },
        other => panic!("unexpected workflow {other:?}"),
    }

    // 2 setup turns + 2 concurrent turns = 8 messages, still alternating.
    let history = world
        .sessions
        .history(&r.session_id, Page::first(50))
        .await
        .expect("history");
    assert_eq!(history.len(), 8);
    assert!(a.latency_ms < 30_000 && b.latency_ms < 30_000);
}

#[tokio::test]
async fn test_concurrent_turns_different_sessions_run_independently() {
    let world = world().await;
    let (a, b) = tokio::join!(world.turn(None, "hi"), world.turn(None, "hello"));
    assert_ne!(a.session_id, b.session_id);
    assert_eq!(world.sessions.session_count().await, 2);
}

#[tokio::test]
async fn test_low_confidence_turns_get_clarification() {
    let world = world().await;
    let r = world.turn(None, "the sky is particularly blue").await;
    assert_eq!(r.intent.as_deref(), Some("other"));
    assert!(r.reply_text.contains("not sure I understood"));
}

#[tokio::test]
async fn test_workflow_cancellation_pattern_clears_draft() {
    let world = world().await;
    let r = world.turn(None, "I need AC repair tomorrow at 2pm").await;
    assert!(r.workflow_active);

    // "never mind" clears the workflow; classification then runs and lands
    // on a clarification reply.
    let r = world.turn(Some(&r), "never mind").await;
    assert!(!r.workflow_active);
    let workflow = world
        .sessions
        .load_workflow(&r.session_id)
        .await
        .expect("load workflow");
    assert!(workflow.is_none());
}

#[tokio::test]
async fn test_policy_turn_attaches_provenance_to_message() {
    let world = world().await;
    world.vectors.seed_chunk(
        POLICY_NAMESPACE,
        "chunk-1",
        0.82,
        "Cancellation policy: 100% refund if cancelled more than 4 hours before the service.",
    );
    world
        .llm
        .push_response("You receive a 100% refund if cancelled more than 4 hours before the service.");

    let r = world.turn(None, "What is your cancellation policy?").await;
    assert_eq!(r.intent.as_deref(), Some("policy_inquiry"));
    assert!(r.reply_text.contains("100% refund"));

    let history = world
        .sessions
        .history(&r.session_id, Page::first(10))
        .await
        .expect("history");
    let assistant = &history[1];
    assert!(!assistant.retrieval_provenance.is_empty());
    assert_eq!(assistant.retrieval_provenance[0].doc_id, "chunk-1");
    let grounding = assistant.grounding_score.expect("grounding persisted");
    assert!(grounding >= 0.60);
}

#[tokio::test]
async fn test_upstream_llm_failure_maps_to_transient_reply() {
    let world = world().await;
    world.vectors.seed_chunk(POLICY_NAMESPACE, "chunk-1", 0.82, "Cancellation policy text.");
    world.llm.set_failing(true);

    let r = world.turn(None, "What is your cancellation policy?").await;
    assert!(r.reply_text.contains("having trouble"));
}

#[tokio::test]
async fn test_empty_and_oversized_text_rejected() {
    let world = world().await;
    let err = world
        .coordinator
        .handle_turn(TurnRequest {
            session_id: None,
            user_ref: UserId::new(1),
            text: "   ".to_string(),
            channel: Channel::Web,
        })
        .await
        .expect_err("empty text");
    assert!(matches!(err, CoreError::InvalidSlotValue { .. }));

    let err = world
        .coordinator
        .handle_turn(TurnRequest {
            session_id: None,
            user_ref: UserId::new(1),
            text: "x".repeat(4001),
            channel: Channel::Web,
        })
        .await
        .expect_err("oversized text");
    assert!(matches!(err, CoreError::InvalidSlotValue { .. }));
}

#[tokio::test]
async fn test_status_inquiry_lists_recent_bookings() {
    let world = world().await;
    let r = world.turn(None, "I need AC repair tomorrow at 2pm").await;
    let r = world.turn(Some(&r), "standard").await;
    let r = world.turn(Some(&r), "1").await;
    let r = world.turn(Some(&r), "my home address").await;
    let r = world.turn(Some(&r), "no").await;
    let r = world.turn(Some(&r), "yes").await;
    assert!(!r.workflow_active);

    let r = world.turn(Some(&r), "where is my booking?").await;
    assert_eq!(r.intent.as_deref(), Some("status_inquiry"));
    assert!(r.reply_text.contains("BKG-"));
    assert!(r.reply_text.contains("AC Repair"));
}

#[tokio::test]
async fn test_reschedule_is_declined() {
    let world = world().await;
    let r = world.turn(None, "can we reschedule my booking to friday").await;
    assert_eq!(r.intent.as_deref(), Some("reschedule"));
    assert!(r.reply_text.to_lowercase().contains("isn't supported"));
    assert!(!r.workflow_active);
}
