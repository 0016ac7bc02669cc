//! Repository traits.
//!
//! All domain logic consumes these object-safe traits; concrete
//! implementations (`convergeai-postgres` in production,
//! `convergeai-testing` in-memory doubles) are injected at the edges. This
//! keeps the per-session serialization story independent of the database
//! driver.

use crate::error::CoreResult;
use crate::types::alert::{Alert, AlertFilter, AlertKind, NewAlert, ResourceRef};
use crate::types::audit::AuditEntry;
use crate::types::booking::{Booking, BookingItem, NewBooking};
use crate::types::catalog::{Address, Category, Pincode, RateCard, Subcategory};
use crate::types::complaint::{
    Complaint, ComplaintFilter, ComplaintStatus, ComplaintUpdate, NewComplaint,
};
use crate::types::ids::{
    AddressId, AlertId, BookingId, CategoryId, ComplaintId, MessageId, RateCardId,
    SessionId, StaffId, SubcategoryId, UserId,
};
use crate::types::session::{ConversationMessage, NewMessage, Session, SessionSummary};
use crate::types::workflow::WorkflowState;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Pagination window for list operations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    /// Maximum rows to return
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

impl Page {
    /// First `limit` rows.
    #[must_use]
    pub const fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 20, offset: 0 }
    }
}

/// Sessions, conversation messages and the per-session workflow slot
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Persist a new empty session.
    ///
    /// Fails with `DatabaseTransient` on id collision; callers mint a new id
    /// and retry.
    async fn create(&self, session: Session) -> CoreResult<()>;

    /// Load a session by id.
    async fn get(&self, session_id: &SessionId) -> CoreResult<Option<Session>>;

    /// Atomically append a message; fails with `SessionNotFound` if the
    /// session is missing.
    async fn append_message(
        &self,
        session_id: &SessionId,
        message: NewMessage,
    ) -> CoreResult<MessageId>;

    /// Load the active workflow, if any.
    async fn load_workflow(&self, session_id: &SessionId) -> CoreResult<Option<WorkflowState>>;

    /// Replace the active workflow; `None` clears it.
    async fn save_workflow(
        &self,
        session_id: &SessionId,
        workflow: Option<WorkflowState>,
    ) -> CoreResult<()>;

    /// Messages ordered by `created_at` ascending.
    async fn history(
        &self,
        session_id: &SessionId,
        page: Page,
    ) -> CoreResult<Vec<ConversationMessage>>;

    /// Session summaries for a user, ordered by last activity descending.
    async fn list_for_user(&self, user_ref: UserId, page: Page)
        -> CoreResult<Vec<SessionSummary>>;

    /// Bump `last_activity_at`.
    async fn touch(&self, session_id: &SessionId, at: DateTime<Utc>) -> CoreResult<()>;

    /// Close a session. Closed sessions reject turns; they are never deleted.
    async fn close(&self, session_id: &SessionId) -> CoreResult<()>;

    /// Ids of open sessions idle longer than `timeout` at `now`.
    async fn find_idle(
        &self,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> CoreResult<Vec<SessionId>>;
}

/// Bookings and their items
#[async_trait]
pub trait BookingRepo: Send + Sync {
    /// Insert a booking and its items atomically; returns the stored row.
    ///
    /// Uniqueness of `order_id` and `booking_number` is enforced by the
    /// datastore.
    async fn insert_with_items(&self, booking: NewBooking) -> CoreResult<Booking>;

    /// Load a booking by id.
    async fn get(&self, id: BookingId) -> CoreResult<Option<Booking>>;

    /// Items of a booking.
    async fn items(&self, id: BookingId) -> CoreResult<Vec<BookingItem>>;

    /// A user's bookings, most recent first.
    async fn list_for_user(&self, user_ref: UserId, page: Page) -> CoreResult<Vec<Booking>>;

    /// Transition a booking to cancelled, cascading to every item and
    /// recording the reason and timestamp. Returns the updated row.
    async fn cancel(
        &self,
        id: BookingId,
        reason: String,
        at: DateTime<Utc>,
    ) -> CoreResult<Booking>;

    /// Total bookings a user has placed (any status); VIP scoring input.
    async fn count_for_user(&self, user_ref: UserId) -> CoreResult<u64>;

    /// All pending bookings; priority-queue projection input.
    async fn list_pending(&self, page: Page) -> CoreResult<Vec<Booking>>;
}

/// Complaints and their status trail
#[async_trait]
pub trait ComplaintRepo: Send + Sync {
    /// Insert a complaint; returns the stored row.
    async fn insert(&self, complaint: NewComplaint) -> CoreResult<Complaint>;

    /// Load a complaint by id.
    async fn get(&self, id: ComplaintId) -> CoreResult<Option<Complaint>>;

    /// Filtered listing, ordered by `created_at` ascending.
    async fn list(&self, filter: ComplaintFilter, page: Page) -> CoreResult<Vec<Complaint>>;

    /// Transition status, recording a [`ComplaintUpdate`] row. Resolution
    /// text is stored when provided.
    async fn set_status(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        actor: Option<StaffId>,
        note: Option<String>,
        resolution: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<Complaint>;

    /// Status-change trail for a complaint, oldest first.
    async fn updates(&self, id: ComplaintId) -> CoreResult<Vec<ComplaintUpdate>>;

    /// Complaints in SLA-tracked statuses (`open`, `in_progress`).
    async fn list_open_for_sla(&self) -> CoreResult<Vec<Complaint>>;

    /// Complaints created at or after `since`.
    async fn list_created_since(&self, since: DateTime<Utc>) -> CoreResult<Vec<Complaint>>;
}

/// Operational alerts
#[async_trait]
pub trait AlertRepo: Send + Sync {
    /// Insert an alert; returns the stored row.
    async fn insert(&self, alert: NewAlert) -> CoreResult<Alert>;

    /// Most recent alert matching the dedup key `(kind, resource)` created
    /// at or after `since`, if any.
    async fn find_recent(
        &self,
        kind: AlertKind,
        resource: &ResourceRef,
        since: DateTime<Utc>,
    ) -> CoreResult<Option<Alert>>;

    /// Filtered listing ordered by `created_at` descending. Rows expired at
    /// `now` are excluded.
    async fn list(
        &self,
        filter: AlertFilter,
        page: Page,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<Alert>>;

    /// Mark an alert read.
    async fn mark_read(&self, id: AlertId, staff: StaffId, at: DateTime<Utc>)
        -> CoreResult<Alert>;

    /// Dismiss an alert.
    async fn dismiss(&self, id: AlertId, staff: StaffId, at: DateTime<Utc>)
        -> CoreResult<Alert>;

    /// Unread, undismissed, unexpired alerts visible to `staff`.
    async fn unread_count(&self, staff: StaffId, now: DateTime<Utc>) -> CoreResult<u64>;
}

/// Read-mostly service catalog
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    /// Active categories.
    async fn list_categories(&self) -> CoreResult<Vec<Category>>;

    /// Active subcategories under a category.
    async fn list_subcategories(&self, category: CategoryId) -> CoreResult<Vec<Subcategory>>;

    /// Load a subcategory by id.
    async fn get_subcategory(&self, id: SubcategoryId) -> CoreResult<Option<Subcategory>>;

    /// Find an active subcategory by a case-insensitive name match.
    async fn find_subcategory_by_name(&self, query: &str) -> CoreResult<Option<Subcategory>>;

    /// Active rate cards under a subcategory, ordered by price ascending.
    async fn list_rate_cards(&self, subcategory: SubcategoryId) -> CoreResult<Vec<RateCard>>;

    /// Load a rate card by id.
    async fn get_rate_card(&self, id: RateCardId) -> CoreResult<Option<RateCard>>;

    /// Text search over rate cards with optional price and category bounds,
    /// ordered by price ascending.
    async fn search_rate_cards(
        &self,
        query: &str,
        min_price: Option<crate::types::money::Money>,
        max_price: Option<crate::types::money::Money>,
        category: Option<CategoryId>,
        limit: u32,
    ) -> CoreResult<Vec<RateCard>>;

    /// Keyword recommendations over subcategory titles and descriptions,
    /// rate cards ordered by price ascending.
    async fn recommend(&self, keywords: &[String], limit: u32) -> CoreResult<Vec<RateCard>>;

    /// Whether at least one active and verified provider serves `pincode`
    /// for `subcategory`.
    async fn is_serviceable(
        &self,
        subcategory: SubcategoryId,
        pincode: &Pincode,
    ) -> CoreResult<bool>;
}

/// User addresses (reads only; CRUD is an external collaborator)
#[async_trait]
pub trait AddressRepo: Send + Sync {
    /// Load an address by id.
    async fn get(&self, id: AddressId) -> CoreResult<Option<Address>>;

    /// The user's default address, if exactly one is marked default.
    async fn default_for_user(&self, user_ref: UserId) -> CoreResult<Option<Address>>;

    /// All addresses of a user.
    async fn list_for_user(&self, user_ref: UserId) -> CoreResult<Vec<Address>>;
}

/// Append-only operations audit log
#[async_trait]
pub trait AuditRepo: Send + Sync {
    /// Append an entry.
    async fn record(&self, entry: AuditEntry) -> CoreResult<()>;

    /// Most recent entries, newest first.
    async fn list_recent(&self, limit: u32) -> CoreResult<Vec<AuditEntry>>;
}
