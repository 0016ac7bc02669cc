//! Cancellation workflow: booking validation, refund schedule, commit.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code

use chrono::{Days, Duration, NaiveTime};
use convergeai_agents::workflow::start_cancellation_draft;
use convergeai_agents::{AgentOutcome, WorkflowDeps, WorkflowEngine};
use convergeai_core::clock::Clock;
use convergeai_core::config::PolicyTables;
use convergeai_core::repo::{AddressRepo, BookingRepo, CatalogRepo, ComplaintRepo};
use convergeai_core::types::booking::{Booking, BookingStatus, PaymentStatus};
use convergeai_core::types::ids::{AddressId, BookingId, SessionId, UserId};
use convergeai_core::types::money::Money;
use convergeai_core::types::workflow::WorkflowState;
use convergeai_testing::{
    standard_catalog, FixedClock, InMemoryBookingRepo, InMemoryComplaintRepo,
};
use std::sync::Arc;

struct World {
    engine: WorkflowEngine,
    bookings: Arc<InMemoryBookingRepo>,
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
        bookings: Arc::clone(&bookings) as Arc<dyn BookingRepo>,
        complaints: complaints as Arc<dyn ComplaintRepo>,
        clock: Arc::clone(&clock) as Arc<dyn Clock>,
        policies: PolicyTables::default(),
    });
    World { engine: WorkflowEngine::new(deps), bookings, clock, session: SessionId::generate() }
}

impl World {
    async fn seed_booking(&self, id: u64, user: u64, status: BookingStatus) -> Booking {
        let now = self.clock.now();
        let booking = Booking {
            id: BookingId::new(id),
            order_id: format!("ORD-TEST{id}"),
            booking_number: format!("BKG-TEST{id}"),
            user_ref: UserId::new(user),
            address_ref: AddressId::new(700),
            subtotal: Money::from_minor(49_900),
            total: Money::from_minor(49_900),
            status,
            payment_status: PaymentStatus::Paid,
            preferred_date: now.date_naive().checked_add_days(Days::new(1)).unwrap(),
            preferred_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            special_instructions: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
        };
        self.bookings.seed(booking.clone(), Vec::new()).await;
        booking
    }

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
        let state = WorkflowState::CancellationDraft(start_cancellation_draft(&entities));
        self.turn(state, utterance).await
    }
}

#[tokio::test]
async fn test_full_refund_when_cancelled_early() {
    let world = world().await;
    // Scheduled tomorrow 14:00, cancelled ~28 hours ahead: full refund.
    world.seed_booking(1, 1, BookingStatus::Pending).await;

    let (outcome, state) = world.start("cancel booking 1").await;
    assert!(outcome.reply_text.to_lowercase().contains("why"));

    let (outcome, state) = world.turn(state.expect("active"), "plans changed").await;
    assert!(outcome.reply_text.to_lowercase().contains("refund"));

    let (outcome, state) = world.turn(state.expect("active"), "wallet").await;
    assert!(outcome.reply_text.contains("100% refund"));
    assert!(outcome.reply_text.contains("499.00"));

    let (outcome, state) = world.turn(state.expect("active"), "yes").await;
    assert!(state.is_none());
    assert_eq!(outcome.action_taken, "cancellation_committed");
    assert!(outcome.reply_text.contains("100% refund"));
    assert!(outcome.reply_text.contains("wallet"));

    let booking = world.bookings.get(BookingId::new(1)).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert!(booking.cancelled_at.is_some());
    assert_eq!(booking.cancellation_reason.as_deref(), Some("plans changed"));
}

#[tokio::test]
async fn test_half_refund_inside_four_hours() {
    let world = world().await;
    let booking = world.seed_booking(2, 1, BookingStatus::Confirmed).await;

    // Move the clock to 3 hours before the scheduled start.
    let scheduled = booking.preferred_date.and_time(booking.preferred_time).and_utc();
    world.clock.set(scheduled - Duration::hours(3));

    let (_, state) = world.start("cancel booking 2").await;
    let (_, state) = world.turn(state.expect("active"), "provider asked me to").await;
    let (outcome, _) = world.turn(state.expect("active"), "original payment").await;
    assert!(outcome.reply_text.contains("50% refund"));
    assert!(outcome.reply_text.contains("249.50"));
}

#[tokio::test]
async fn test_no_refund_inside_two_hours() {
    let world = world().await;
    let booking = world.seed_booking(3, 1, BookingStatus::Confirmed).await;
    let scheduled = booking.preferred_date.and_time(booking.preferred_time).and_utc();
    world.clock.set(scheduled - Duration::minutes(90));

    let (_, state) = world.start("cancel booking 3").await;
    let (_, state) = world.turn(state.expect("active"), "emergency").await;
    let (outcome, _) = world.turn(state.expect("active"), "original").await;
    assert!(outcome.reply_text.contains("0% refund"));
}

#[tokio::test]
async fn test_completed_booking_not_cancellable() {
    let world = world().await;
    world.seed_booking(4, 1, BookingStatus::Completed).await;

    let (outcome, state) = world.start("cancel booking 4").await;
    assert!(outcome.reply_text.contains("no longer be cancelled"));
    // The invalid booking reference is dropped and reprompted.
    match state.expect("workflow preserved") {
        WorkflowState::CancellationDraft(draft) => assert_eq!(draft.booking_id, None),
        other => panic!("unexpected state {other:?}"),
    }
}

#[tokio::test]
async fn test_foreign_booking_rejected() {
    let world = world().await;
    world.seed_booking(5, 99, BookingStatus::Pending).await;

    let (outcome, _) = world.start("cancel booking 5").await;
    assert!(outcome.reply_text.contains("couldn't find that booking"));
}
