//! Priority queue projection.
//!
//! Ranks pending operational items (open complaints and pending bookings)
//! at query time; nothing is stored. Given identical inputs the ordering
//! is deterministic: score descending, then `created_at` ascending, then
//! resource id.

use chrono::{DateTime, Duration, Utc};
use convergeai_core::clock::Clock;
use convergeai_core::error::CoreResult;
use convergeai_core::repo::{BookingRepo, ComplaintRepo, Page};
use convergeai_core::types::alert::{ResourceKind, ResourceRef};
use convergeai_core::types::complaint::{Complaint, ComplaintFilter, ComplaintPriority};
use convergeai_core::types::ids::UserId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Bookings a user needs before the VIP bonus applies.
const VIP_BOOKING_THRESHOLD: u64 = 5;

/// VIP bonus points.
const VIP_BONUS: i32 = 15;

/// Base score for a pending booking.
const BOOKING_BASE: i32 = 30;

/// What a queue item points at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemKind {
    /// An open or in-progress complaint
    Complaint,
    /// A booking awaiting confirmation
    BookingPending,
}

/// One projected row
#[derive(Clone, Debug, Serialize)]
pub struct PriorityQueueItem {
    /// Item kind
    pub kind: QueueItemKind,
    /// Resource the row points at
    pub resource: ResourceRef,
    /// Computed score in [0, 100]
    pub priority_score: u8,
    /// One-line summary for the ops list
    pub title: String,
    /// Complaint priority, complaints only
    pub priority: Option<ComplaintPriority>,
    /// Owning user
    pub user_ref: UserId,
    /// Creation time; ordering tiebreaker
    pub created_at: DateTime<Utc>,
}

/// Query-time projector over live complaint and booking rows
pub struct PriorityQueueProjector {
    complaints: Arc<dyn ComplaintRepo>,
    bookings: Arc<dyn BookingRepo>,
    clock: Arc<dyn Clock>,
}

impl PriorityQueueProjector {
    /// Create a projector.
    #[must_use]
    pub fn new(
        complaints: Arc<dyn ComplaintRepo>,
        bookings: Arc<dyn BookingRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { complaints, bookings, clock }
    }

    /// Project the queue. Pending bookings are included only for an
    /// unconstrained filter; complaint-specific filters narrow the
    /// projection to complaints.
    ///
    /// # Errors
    ///
    /// Propagates repository errors.
    #[instrument(skip_all)]
    pub async fn project(
        &self,
        filter: ComplaintFilter,
        page: Page,
    ) -> CoreResult<Vec<PriorityQueueItem>> {
        let now = self.clock.now();
        let unconstrained = filter.status.is_none()
            && filter.priority.is_none()
            && filter.assigned.is_none();

        let complaints = self.complaints.list(filter, Page { limit: u32::MAX, offset: 0 }).await?;

        let mut vip_cache: HashMap<UserId, bool> = HashMap::new();
        let mut items = Vec::new();
        for complaint in complaints
            .iter()
            .filter(|c| c.status.is_sla_tracked())
        {
            let vip = self.is_vip(&mut vip_cache, complaint.user_ref).await?;
            items.push(project_complaint(complaint, now, vip));
        }

        if unconstrained {
            let pending = self.bookings.list_pending(Page { limit: u32::MAX, offset: 0 }).await?;
            for booking in &pending {
                let vip = self.is_vip(&mut vip_cache, booking.user_ref).await?;
                items.push(PriorityQueueItem {
                    kind: QueueItemKind::BookingPending,
                    resource: ResourceRef::new(ResourceKind::Booking, booking.id),
                    priority_score: clamp_score(BOOKING_BASE + if vip { VIP_BONUS } else { 0 }),
                    title: format!("Pending booking {}", booking.booking_number),
                    priority: None,
                    user_ref: booking.user_ref,
                    created_at: booking.created_at,
                });
            }
        }

        items.sort_by(|a, b| {
            b.priority_score
                .cmp(&a.priority_score)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.resource.id.cmp(&b.resource.id))
        });
        Ok(items
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn is_vip(
        &self,
        cache: &mut HashMap<UserId, bool>,
        user: UserId,
    ) -> CoreResult<bool> {
        if let Some(&vip) = cache.get(&user) {
            return Ok(vip);
        }
        let vip = self.bookings.count_for_user(user).await? >= VIP_BOOKING_THRESHOLD;
        cache.insert(user, vip);
        Ok(vip)
    }
}

fn project_complaint(complaint: &Complaint, now: DateTime<Utc>, vip: bool) -> PriorityQueueItem {
    let score = complaint_base(complaint.priority)
        + sentiment_penalty(complaint.sentiment)
        + sla_risk_bonus(now, complaint.response_due_at, complaint.resolution_due_at)
        + if vip { VIP_BONUS } else { 0 };
    PriorityQueueItem {
        kind: QueueItemKind::Complaint,
        resource: ResourceRef::new(ResourceKind::Complaint, complaint.id),
        priority_score: clamp_score(score),
        title: complaint.subject.clone(),
        priority: Some(complaint.priority),
        user_ref: complaint.user_ref,
        created_at: complaint.created_at,
    }
}

const fn complaint_base(priority: ComplaintPriority) -> i32 {
    match priority {
        ComplaintPriority::Critical => 80,
        ComplaintPriority::High => 70,
        ComplaintPriority::Medium => 50,
        ComplaintPriority::Low => 30,
    }
}

/// `round((-sentiment) × 20)`, clamped to [0, 20]; complaints only.
fn sentiment_penalty(sentiment: f32) -> i32 {
    let raw = (-sentiment * 20.0).round() as i32;
    raw.clamp(0, 20)
}

/// 0 with time in hand, 10 inside the final hour, 20 past any deadline.
fn sla_risk_bonus(
    now: DateTime<Utc>,
    response_due: DateTime<Utc>,
    resolution_due: DateTime<Utc>,
) -> i32 {
    let nearest = response_due.min(resolution_due);
    if now >= nearest {
        20
    } else if nearest - now <= Duration::hours(1) {
        10
    } else {
        0
    }
}

fn clamp_score(score: i32) -> u8 {
    score.clamp(0, 100) as u8
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use super::*;
    use chrono::Utc;
    use convergeai_core::types::complaint::{ComplaintStatus, ComplaintType};
    use convergeai_core::types::ids::ComplaintId;

    fn complaint(
        priority: ComplaintPriority,
        sentiment: f32,
        response_in_hours: i64,
        created_at: DateTime<Utc>,
    ) -> Complaint {
        Complaint {
            id: ComplaintId::new(1),
            user_ref: UserId::new(1),
            booking_ref: None,
            session_ref: None,
            complaint_type: ComplaintType::ServiceQuality,
            subject: "service quality complaint".to_string(),
            description: "details".to_string(),
            priority,
            status: ComplaintStatus::Open,
            assigned_staff: None,
            resolution: None,
            sentiment,
            response_due_at: created_at + Duration::hours(response_in_hours),
            resolution_due_at: created_at + Duration::hours(response_in_hours + 20),
            created_at,
        }
    }

    #[test]
    fn test_score_components() {
        let now = Utc::now();
        // high base 70, sentiment -0.5 → +10, deadline far → 0, no vip
        let c = complaint(ComplaintPriority::High, -0.5, 6, now);
        let item = project_complaint(&c, now, false);
        assert_eq!(item.priority_score, 80);

        // within the final hour → +10
        let c = complaint(ComplaintPriority::High, -0.5, 1, now);
        let item = project_complaint(&c, now, false);
        assert_eq!(item.priority_score, 90);

        // past deadline → +20, vip → +15, clamped at 100
        let c = complaint(ComplaintPriority::Critical, -1.0, -1, now);
        let item = project_complaint(&c, now, true);
        assert_eq!(item.priority_score, 100);
    }

    #[test]
    fn test_sentiment_penalty_clamps() {
        assert_eq!(sentiment_penalty(0.8), 0);
        assert_eq!(sentiment_penalty(0.0), 0);
        assert_eq!(sentiment_penalty(-0.25), 5);
        assert_eq!(sentiment_penalty(-1.0), 20);
        assert_eq!(sentiment_penalty(-5.0), 20);
    }

    #[test]
    fn test_positive_sentiment_never_lowers_base() {
        let now = Utc::now();
        let c = complaint(ComplaintPriority::Low, 1.0, 6, now);
        let item = project_complaint(&c, now, false);
        assert_eq!(item.priority_score, 30);
    }
}
