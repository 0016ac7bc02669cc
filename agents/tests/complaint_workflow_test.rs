//! Complaint workflow: slot filling, priority derivation, SLA stamping.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code

use chrono::Duration;
use convergeai_agents::workflow::start_complaint_draft;
use convergeai_agents::{AgentOutcome, WorkflowDeps, WorkflowEngine};
use convergeai_core::clock::Clock;
use convergeai_core::config::PolicyTables;
use convergeai_core::repo::{AddressRepo, BookingRepo, CatalogRepo, ComplaintRepo, Page};
use convergeai_core::types::complaint::{ComplaintFilter, ComplaintPriority, ComplaintType};
use convergeai_core::types::ids::{SessionId, UserId};
use convergeai_core::types::workflow::WorkflowState;
use convergeai_testing::{
    standard_catalog, FixedClock, InMemoryBookingRepo, InMemoryComplaintRepo,
};
use std::sync::Arc;

struct World {
    engine: WorkflowEngine,
    complaints: Arc<InMemoryComplaintRepo>,
    clock: Arc<FixedClock>,
    session: SessionId,
}

async fn world() -> World {
    let (catalog, addresses, _fixture) = standard_catalog().await;
    let bookings = Arc::new(InMemoryBookingRepo::new());
    let complaints = Arc::new(InMemoryComplaintRepo::new());
    let clock = Arc::new(FixedClock::monday_morning());
    let deps = Arc::new(WorkflowDeps {
        catalog: catalog as Arc<dyn CatalogRepo>,
        addresses: addresses as Arc<dyn AddressRepo>,
        bookings: bookings as Arc<dyn BookingRepo>,
        complaints: Arc::clone(&complaints) as Arc<dyn ComplaintRepo>,
        clock: Arc::clone(&clock) as Arc<dyn Clock>,
        policies: PolicyTables::default(),
    });
    World { engine: WorkflowEngine::new(deps), complaints, clock, session: SessionId::generate() }
}

impl World {
    async fn turn(
        &self,
        state: WorkflowState,
        utterance: &str,
    ) -> (AgentOutcome, Option<WorkflowState>) {
        let today = self.clock.now().date_naive();
        let entities = convergeai_nlu::extract(utterance, today);
        let outcome = self
            .engine
            .handle_turn(&self.session, UserId::new(1), state, utterance, &entities)
            .await;
        let next = outcome.workflow_after.clone();
        (outcome, next)
    }

    async fn start(&self, utterance: &str) -> (AgentOutcome, Option<WorkflowState>) {
        let today = self.clock.now().date_naive();
        let entities = convergeai_nlu::extract(utterance, today);
        let state = WorkflowState::ComplaintDraft(start_complaint_draft(&entities));
        self.turn(state, utterance).await
    }
}

#[tokio::test]
async fn test_complaint_flow_with_urgent_keyword() {
    let world = world().await;
    let filed_at = world.clock.now();

    let (outcome, state) = world.start("I want to raise a complaint").await;
    assert!(outcome.reply_text.contains("1. service quality"));

    let (outcome, state) = world.turn(state.expect("active"), "2").await;
    assert!(outcome.reply_text.to_lowercase().contains("booking"));

    let (outcome, state) = world.turn(state.expect("active"), "no").await;
    assert!(outcome.reply_text.to_lowercase().contains("describe"));

    let (outcome, state) = world
        .turn(
            state.expect("active"),
            "The technician shouted at my parents, please treat this as urgent.",
        )
        .await;
    assert!(outcome.reply_text.contains("Shall I file it?"));

    let (outcome, state) = world.turn(state.expect("active"), "yes").await;
    assert!(state.is_none());
    assert_eq!(outcome.action_taken, "complaint_committed");
    assert!(outcome.reply_text.contains("ticket #"));
    assert!(outcome.reply_text.contains("high priority"));

    let complaints = world
        .complaints
        .list(ComplaintFilter::default(), Page::first(10))
        .await
        .unwrap();
    assert_eq!(complaints.len(), 1);
    let complaint = &complaints[0];
    assert_eq!(complaint.complaint_type, ComplaintType::ProviderBehavior);
    assert_eq!(complaint.priority, ComplaintPriority::High);
    assert_eq!(complaint.session_ref, Some(world.session.clone()));
    // SLA deadlines are stored as absolute timestamps from the table.
    assert_eq!(complaint.response_due_at, filed_at + Duration::hours(4));
    assert_eq!(complaint.resolution_due_at, filed_at + Duration::hours(24));
}

#[tokio::test]
async fn test_short_description_reprompted() {
    let world = world().await;
    let (_, state) = world.start("complaint please").await;
    let (_, state) = world.turn(state.expect("active"), "billing").await;
    let (_, state) = world.turn(state.expect("active"), "no").await;

    let (outcome, state) = world.turn(state.expect("active"), "too expensive").await;
    let state = state.expect("still gathering");
    assert!(outcome.reply_text.contains("20 characters"));
    match &state {
        WorkflowState::ComplaintDraft(draft) => {
            assert_eq!(draft.description, None);
            assert_eq!(draft.validator_failures, 1);
        },
        other => panic!("unexpected state {other:?}"),
    }

    // A 20+ character description is accepted.
    let (outcome, _) = world
        .turn(state, "I was charged twice for the same visit last week.")
        .await;
    assert!(outcome.reply_text.contains("Shall I file it?"));
}

#[tokio::test]
async fn test_legal_keyword_escalates_to_critical() {
    let world = world().await;
    let filed_at = world.clock.now();
    let (_, state) = world.start("I have a complaint").await;
    let (_, state) = world.turn(state.expect("active"), "service quality").await;
    let (_, state) = world.turn(state.expect("active"), "no").await;
    let (_, state) = world
        .turn(
            state.expect("active"),
            "The repair flooded my kitchen and I will pursue legal action this week.",
        )
        .await;
    let (outcome, _) = world.turn(state.expect("active"), "yes").await;
    assert!(outcome.reply_text.contains("critical priority"));

    let complaints = world
        .complaints
        .list(ComplaintFilter::default(), Page::first(10))
        .await
        .unwrap();
    assert_eq!(complaints[0].priority, ComplaintPriority::Critical);
    // Critical SLA: respond in 1 hour, resolve in 8.
    assert_eq!(complaints[0].response_due_at, filed_at + Duration::hours(1));
    assert_eq!(complaints[0].resolution_due_at, filed_at + Duration::hours(8));
}

#[tokio::test]
async fn test_refund_issue_defaults_to_high() {
    let world = world().await;
    let (_, state) = world.start("I have a complaint").await;
    let (_, state) = world.turn(state.expect("active"), "refund").await;
    let (_, state) = world.turn(state.expect("active"), "no").await;
    let (_, state) = world
        .turn(
            state.expect("active"),
            "The promised amount has not reached my account after ten days.",
        )
        .await;
    let (outcome, _) = world.turn(state.expect("active"), "yes").await;
    assert!(outcome.reply_text.contains("high priority"));
}

#[tokio::test]
async fn test_very_negative_sentiment_is_critical() {
    let world = world().await;
    let (_, state) = world.start("I have a complaint").await;
    let (_, state) = world.turn(state.expect("active"), "delay").await;
    let (_, state) = world.turn(state.expect("active"), "no").await;
    let (_, state) = world
        .turn(
            state.expect("active"),
            "Horrible, pathetic, unacceptable, rude and useless - the worst service.",
        )
        .await;
    let (outcome, _) = world.turn(state.expect("active"), "yes").await;
    assert!(outcome.reply_text.contains("critical priority"));

    let complaints = world
        .complaints
        .list(ComplaintFilter::default(), Page::first(10))
        .await
        .unwrap();
    assert!(complaints[0].sentiment <= -0.8);
}
