//! Priority queue projection: score formula, clamps, deterministic order.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code

use chrono::{Days, Duration, NaiveTime};
use convergeai_core::clock::Clock;
use convergeai_core::config::SlaPolicy;
use convergeai_core::repo::{BookingRepo, ComplaintRepo, Page};
use convergeai_core::types::booking::{Booking, BookingStatus, PaymentStatus};
use convergeai_core::types::complaint::{ComplaintFilter, ComplaintPriority, ComplaintType, NewComplaint};
use convergeai_core::types::ids::{AddressId, BookingId, UserId};
use convergeai_core::types::money::Money;
use convergeai_ops::{PriorityQueueProjector, QueueItemKind};
use convergeai_testing::{FixedClock, InMemoryBookingRepo, InMemoryComplaintRepo};
use std::sync::Arc;

struct World {
    projector: PriorityQueueProjector,
    complaints: Arc<InMemoryComplaintRepo>,
    bookings: Arc<InMemoryBookingRepo>,
    clock: Arc<FixedClock>,
}

fn world() -> World {
    let complaints = Arc::new(InMemoryComplaintRepo::new());
    let bookings = Arc::new(InMemoryBookingRepo::new());
    let clock = Arc::new(FixedClock::monday_morning());
    let projector = PriorityQueueProjector::new(
        Arc::clone(&complaints) as Arc<dyn ComplaintRepo>,
        Arc::clone(&bookings) as Arc<dyn BookingRepo>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    World { projector, complaints, bookings, clock }
}

impl World {
    async fn complaint(
        &self,
        user: u64,
        priority: ComplaintPriority,
        sentiment: f32,
        response_in: Duration,
    ) -> convergeai_core::types::complaint::Complaint {
        let now = self.clock.now();
        let (_, resolution_due_at) = SlaPolicy::default()
            .deadlines(priority, now)
            .expect("sla row");
        self.complaints
            .seed(NewComplaint {
                user_ref: UserId::new(user),
                booking_ref: None,
                session_ref: None,
                complaint_type: ComplaintType::Delay,
                subject: format!("{priority} complaint"),
                description: "details".to_string(),
                priority,
                sentiment,
                response_due_at: now + response_in,
                resolution_due_at,
                created_at: now,
            })
            .await
            .expect("seed")
    }

    async fn pending_booking(&self, id: u64, user: u64) {
        let now = self.clock.now();
        self.bookings
            .seed(
                Booking {
                    id: BookingId::new(id),
                    order_id: format!("ORD-{id}"),
                    booking_number: format!("BKG-{id}"),
                    user_ref: UserId::new(user),
                    address_ref: AddressId::new(1),
                    subtotal: Money::from_minor(10_000),
                    total: Money::from_minor(10_000),
                    status: BookingStatus::Pending,
                    payment_status: PaymentStatus::Unpaid,
                    preferred_date: now.date_naive().checked_add_days(Days::new(1)).unwrap(),
                    preferred_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                    special_instructions: None,
                    cancelled_at: None,
                    cancellation_reason: None,
                    created_at: now,
                },
                Vec::new(),
            )
            .await;
    }
}

#[tokio::test]
async fn test_score_formula_components() {
    let world = world();
    // critical base 80, neutral sentiment, 6h slack: 80.
    world.complaint(1, ComplaintPriority::Critical, 0.0, Duration::hours(6)).await;
    // high base 70, sentiment -1.0 (+20), past deadline (+20): 100 hard cap anyway at 110 -> 100.
    world.complaint(2, ComplaintPriority::High, -1.0, Duration::hours(-1)).await;
    // low base 30, sentiment -0.25 (+5), 30 minutes to deadline (+10): 45.
    world.complaint(3, ComplaintPriority::Low, -0.25, Duration::minutes(30)).await;

    let items = world
        .projector
        .project(ComplaintFilter::default(), Page::first(10))
        .await
        .expect("project");

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].priority_score, 100);
    assert_eq!(items[0].priority, Some(ComplaintPriority::High));
    assert_eq!(items[1].priority_score, 80);
    assert_eq!(items[2].priority_score, 45);
    for item in &items {
        assert!(item.priority_score <= 100);
    }
}

#[tokio::test]
async fn test_vip_bonus_applies_with_five_bookings() {
    let world = world();
    for id in 1..=5 {
        world.pending_booking(id, 7).await;
    }
    // medium base 50 + vip 15 = 65 for the VIP user's complaint.
    world.complaint(7, ComplaintPriority::Medium, 0.0, Duration::hours(6)).await;
    // Identical complaint from a non-VIP user scores 50.
    world.complaint(8, ComplaintPriority::Medium, 0.0, Duration::hours(6)).await;

    let items = world
        .projector
        .project(
            ComplaintFilter { priority: Some(ComplaintPriority::Medium), ..Default::default() },
            Page::first(10),
        )
        .await
        .expect("project");

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].user_ref, UserId::new(7));
    assert_eq!(items[0].priority_score, 65);
    assert_eq!(items[1].priority_score, 50);
}

#[tokio::test]
async fn test_pending_bookings_included_when_unfiltered() {
    let world = world();
    world.pending_booking(1, 3).await;
    world.complaint(2, ComplaintPriority::Low, 0.0, Duration::hours(20)).await;

    let items = world
        .projector
        .project(ComplaintFilter::default(), Page::first(10))
        .await
        .expect("project");
    assert_eq!(items.len(), 2);
    assert!(items.iter().any(|i| i.kind == QueueItemKind::BookingPending));

    // A complaint-specific filter narrows the projection to complaints.
    let items = world
        .projector
        .project(
            ComplaintFilter { priority: Some(ComplaintPriority::Low), ..Default::default() },
            Page::first(10),
        )
        .await
        .expect("project");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, QueueItemKind::Complaint);
}

#[tokio::test]
async fn test_ordering_is_deterministic_with_equal_scores() {
    let world = world();
    // Same score for all three; creation order must decide, repeatably.
    let a = world.complaint(1, ComplaintPriority::Medium, 0.0, Duration::hours(6)).await;
    world.clock.advance(Duration::minutes(1));
    let b = world.complaint(2, ComplaintPriority::Medium, 0.0, Duration::hours(6)).await;
    world.clock.advance(Duration::minutes(1));
    let c = world.complaint(3, ComplaintPriority::Medium, 0.0, Duration::hours(6)).await;

    let first = world
        .projector
        .project(ComplaintFilter::default(), Page::first(10))
        .await
        .expect("project");
    let second = world
        .projector
        .project(ComplaintFilter::default(), Page::first(10))
        .await
        .expect("project");

    let order: Vec<String> = first.iter().map(|i| i.resource.id.clone()).collect();
    let order_again: Vec<String> = second.iter().map(|i| i.resource.id.clone()).collect();
    assert_eq!(order, order_again);
    assert_eq!(order, vec![a.id.to_string(), b.id.to_string(), c.id.to_string()]);
}
