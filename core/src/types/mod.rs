//! Domain types for the ConvergeAI core.

pub mod alert;
pub mod audit;
pub mod booking;
pub mod catalog;
pub mod complaint;
pub mod ids;
pub mod money;
pub mod session;
pub mod workflow;

pub use alert::{Alert, AlertFilter, AlertKind, AlertSeverity, NewAlert, ResourceKind, ResourceRef};
pub use audit::AuditEntry;
pub use booking::{
    Booking, BookingItem, BookingStatus, NewBooking, NewBookingItem, PaymentStatus,
    booking_total_matches,
};
pub use catalog::{Address, Category, Pincode, Provider, RateCard, Subcategory};
pub use complaint::{
    Complaint, ComplaintFilter, ComplaintPriority, ComplaintStatus, ComplaintType,
    ComplaintUpdate, NewComplaint,
};
pub use ids::{
    AddressId, AlertId, BookingId, BookingItemId, CategoryId, ComplaintId, MessageId,
    ProviderId, RateCardId, SessionId, StaffId, SubcategoryId, UserId, MAX_OPAQUE_ID_LEN,
};
pub use money::Money;
pub use session::{
    Channel, ConversationMessage, NewMessage, RetrievalProvenance, Role, Session,
    SessionStatus, SessionSummary,
};
pub use workflow::{
    BookingDraft, BookingSlot, CancellationDraft, ComplaintDraft, RefundMode,
    RescheduleDraft, WorkflowKind, WorkflowState,
};
