//! Multi-turn workflow drafts.
//!
//! `WorkflowState` is a tagged sum type persisted as internally-tagged JSON
//! so stored drafts stay readable across releases. Each variant carries its
//! own slot struct plus two engine-internal counters: consecutive validator
//! failures on the pending slot, and confirmation re-asks.
//!
//! Invariants:
//! - `pending_slot` names a slot that is currently unset and next in the
//!   workflow's required order.
//! - `confirmed` only becomes true via an explicit user confirmation turn.

use super::ids::{AddressId, BookingId, RateCardId, SubcategoryId};
use super::complaint::{ComplaintPriority, ComplaintType};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a workflow draft
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Booking creation
    Booking,
    /// Booking cancellation
    Cancellation,
    /// Complaint filing
    Complaint,
    /// Booking reschedule (not supported at commit level)
    Reschedule,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Booking => write!(f, "booking"),
            Self::Cancellation => write!(f, "cancellation"),
            Self::Complaint => write!(f, "complaint"),
            Self::Reschedule => write!(f, "reschedule"),
        }
    }
}

/// Active workflow attached to a session, at most one
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowState {
    /// Booking creation draft
    BookingDraft(BookingDraft),
    /// Cancellation draft
    CancellationDraft(CancellationDraft),
    /// Complaint draft
    ComplaintDraft(ComplaintDraft),
    /// Reschedule draft; retained for stored-data compatibility, never created
    RescheduleDraft(RescheduleDraft),
}

impl WorkflowState {
    /// Discriminant of this draft
    #[must_use]
    pub const fn kind(&self) -> WorkflowKind {
        match self {
            Self::BookingDraft(_) => WorkflowKind::Booking,
            Self::CancellationDraft(_) => WorkflowKind::Cancellation,
            Self::ComplaintDraft(_) => WorkflowKind::Complaint,
            Self::RescheduleDraft(_) => WorkflowKind::Reschedule,
        }
    }
}

/// Named booking slot, used for `pending_slot` and targeted reprompts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingSlot {
    /// Service subcategory
    Subcategory,
    /// Priced rate card under the subcategory
    RateCard,
    /// Unit quantity
    Quantity,
    /// Service address
    Address,
    /// Preferred service date
    PreferredDate,
    /// Preferred service time
    PreferredTime,
    /// Free-text instructions, skippable
    SpecialInstructions,
}

impl BookingSlot {
    /// Snake-case slot name for prompts and error messages
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Subcategory => "subcategory",
            Self::RateCard => "rate_card",
            Self::Quantity => "quantity",
            Self::Address => "address",
            Self::PreferredDate => "preferred_date",
            Self::PreferredTime => "preferred_time",
            Self::SpecialInstructions => "special_instructions",
        }
    }
}

/// Slots gathered for a booking
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingDraft {
    /// Free-text service query the user opened with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_query: Option<String>,
    /// Chosen subcategory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory_id: Option<SubcategoryId>,
    /// Chosen rate card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_card_id: Option<RateCardId>,
    /// Unit quantity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// Service address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_id: Option<AddressId>,
    /// Preferred date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_date: Option<NaiveDate>,
    /// Preferred time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<NaiveTime>,
    /// Special instructions; `Some("")` after an explicit skip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    /// Set only by an explicit user confirmation turn
    #[serde(default)]
    pub confirmed: bool,
    /// Slot the engine is currently prompting for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_slot: Option<BookingSlot>,
    /// Consecutive validator failures on the pending slot
    #[serde(default)]
    pub validator_failures: u8,
    /// Confirmation re-asks already spent
    #[serde(default)]
    pub confirm_attempts: u8,
}

/// Refund destination for a cancellation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundMode {
    /// Refund to the original payment method
    Original,
    /// Refund to platform wallet
    Wallet,
}

impl fmt::Display for RefundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "original payment method"),
            Self::Wallet => write!(f, "wallet"),
        }
    }
}

/// Slots gathered for a cancellation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CancellationDraft {
    /// Booking to cancel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    /// Cancellation reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Refund destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_mode: Option<RefundMode>,
    /// Consecutive validator failures on the pending slot
    #[serde(default)]
    pub validator_failures: u8,
    /// Confirmation re-asks already spent
    #[serde(default)]
    pub confirm_attempts: u8,
}

/// Slots gathered for a complaint
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplaintDraft {
    /// Complaint category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<ComplaintType>,
    /// Related booking; `None` after an explicit skip is tracked separately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_booking_id: Option<BookingId>,
    /// Whether the related-booking slot was answered (including "none")
    #[serde(default)]
    pub related_booking_answered: bool,
    /// Issue description, at least 20 characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Severity override extracted from the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<ComplaintPriority>,
    /// Consecutive validator failures on the pending slot
    #[serde(default)]
    pub validator_failures: u8,
    /// Confirmation re-asks already spent
    #[serde(default)]
    pub confirm_attempts: u8,
}

/// Slots for a reschedule; nothing creates this draft (commit unsupported)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RescheduleDraft {
    /// Booking to reschedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    /// New date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_date: Option<NaiveDate>,
    /// New time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_time: Option<NaiveTime>,
}
