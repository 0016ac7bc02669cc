//! Bookings and booking items.
//!
//! A booking owns its items (composition). Invariants:
//! - `total` equals the sum of item `final_amount`s.
//! - `completed` is terminal.
//! - a cancelled booking retains its items, but every item moves to
//!   `cancelled` with it.

use super::ids::{AddressId, BookingId, BookingItemId, ProviderId, RateCardId, UserId};
use super::money::Money;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Booking lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, awaiting confirmation by operations
    Pending,
    /// Confirmed and scheduled
    Confirmed,
    /// Provider on site
    InProgress,
    /// Service delivered; terminal
    Completed,
    /// Cancelled by user or operations
    Cancelled,
}

impl BookingStatus {
    /// Whether a user-initiated cancellation is allowed from this status.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Whether the status admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Payment state of a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Not yet paid
    Unpaid,
    /// Paid in full
    Paid,
    /// Refunded after cancellation
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "unpaid"),
            Self::Paid => write!(f, "paid"),
            Self::Refunded => write!(f, "refunded"),
        }
    }
}

/// A committed booking
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking id
    pub id: BookingId,
    /// Human-readable order token, unique process-wide
    pub order_id: String,
    /// Second human token quoted back to the user
    pub booking_number: String,
    /// Owning user
    pub user_ref: UserId,
    /// Service address
    pub address_ref: AddressId,
    /// Sum of item totals before adjustments
    pub subtotal: Money,
    /// Amount payable; equals the sum of item final amounts
    pub total: Money,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Payment state
    pub payment_status: PaymentStatus,
    /// Preferred service date
    pub preferred_date: NaiveDate,
    /// Preferred service start time
    pub preferred_time: NaiveTime,
    /// Free-text instructions
    pub special_instructions: Option<String>,
    /// When cancelled, if cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why cancelled, if cancelled
    pub cancellation_reason: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A line item within a booking
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingItem {
    /// Item id
    pub id: BookingItemId,
    /// Owning booking
    pub booking_id: BookingId,
    /// Rate card booked
    pub rate_card_id: RateCardId,
    /// Assigned provider; null until assignment (out of scope here)
    pub provider_ref: Option<ProviderId>,
    /// Service address
    pub address_ref: AddressId,
    /// Service display name at time of booking
    pub service_name: String,
    /// Unit quantity
    pub quantity: u32,
    /// Price per unit at time of booking
    pub unit_price: Money,
    /// `unit_price × quantity`
    pub total_amount: Money,
    /// Amount after adjustments; taxes and discounts are external
    pub final_amount: Money,
    /// Scheduled service date
    pub scheduled_date: NaiveDate,
    /// Scheduled window start
    pub scheduled_window_from: NaiveTime,
    /// Scheduled window end, clamped to closing time
    pub scheduled_window_to: NaiveTime,
    /// Item status; cascades from the booking on cancellation
    pub status: BookingStatus,
    /// Item payment state
    pub payment_status: PaymentStatus,
}

/// A booking awaiting insert; ids are assigned by the repository.
#[derive(Clone, Debug)]
pub struct NewBooking {
    /// Human-readable order token, unique process-wide
    pub order_id: String,
    /// Second human token quoted back to the user
    pub booking_number: String,
    /// Owning user
    pub user_ref: UserId,
    /// Service address
    pub address_ref: AddressId,
    /// Sum of item totals before adjustments
    pub subtotal: Money,
    /// Amount payable
    pub total: Money,
    /// Preferred service date
    pub preferred_date: NaiveDate,
    /// Preferred service start time
    pub preferred_time: NaiveTime,
    /// Free-text instructions
    pub special_instructions: Option<String>,
    /// Creation timestamp from the caller's clock
    pub created_at: DateTime<Utc>,
    /// Items persisted atomically with the booking
    pub items: Vec<NewBookingItem>,
}

/// A booking item awaiting insert
#[derive(Clone, Debug)]
pub struct NewBookingItem {
    /// Rate card booked
    pub rate_card_id: RateCardId,
    /// Service address
    pub address_ref: AddressId,
    /// Service display name at time of booking
    pub service_name: String,
    /// Unit quantity
    pub quantity: u32,
    /// Price per unit at time of booking
    pub unit_price: Money,
    /// `unit_price × quantity`
    pub total_amount: Money,
    /// Amount after adjustments
    pub final_amount: Money,
    /// Scheduled service date
    pub scheduled_date: NaiveDate,
    /// Scheduled window start
    pub scheduled_window_from: NaiveTime,
    /// Scheduled window end
    pub scheduled_window_to: NaiveTime,
}

/// Checks the booking/items money invariant: `total == Σ items.final_amount`.
#[must_use]
pub fn booking_total_matches(booking: &Booking, items: &[BookingItem]) -> bool {
    Money::checked_sum(items.iter().map(|i| i.final_amount)) == Some(booking.total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellable_statuses() {
        assert!(BookingStatus::Pending.is_cancellable());
        assert!(BookingStatus::Confirmed.is_cancellable());
        assert!(!BookingStatus::InProgress.is_cancellable());
        assert!(!BookingStatus::Completed.is_cancellable());
        assert!(!BookingStatus::Cancelled.is_cancellable());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
    }
}
