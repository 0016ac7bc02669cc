//! Complaints, their SLA deadlines and status trail.
//!
//! SLA deadlines are derived once at creation from `(type, priority)` via
//! the configured policy table and stored as absolute timestamps.

use super::ids::{BookingId, ComplaintId, SessionId, StaffId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Complaint category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintType {
    /// Work quality below expectations
    ServiceQuality,
    /// Provider conduct
    ProviderBehavior,
    /// Charges or invoicing
    Billing,
    /// Late arrival or no-show
    Delay,
    /// Problems cancelling a booking
    CancellationIssue,
    /// Missing or partial refund
    RefundIssue,
    /// Anything else
    Other,
}

impl ComplaintType {
    /// All categories, in display order for prompts.
    pub const ALL: [Self; 7] = [
        Self::ServiceQuality,
        Self::ProviderBehavior,
        Self::Billing,
        Self::Delay,
        Self::CancellationIssue,
        Self::RefundIssue,
        Self::Other,
    ];

    /// Human-readable label for prompts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ServiceQuality => "service quality",
            Self::ProviderBehavior => "provider behavior",
            Self::Billing => "billing",
            Self::Delay => "delay",
            Self::CancellationIssue => "cancellation issue",
            Self::RefundIssue => "refund issue",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ComplaintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceQuality => write!(f, "service_quality"),
            Self::ProviderBehavior => write!(f, "provider_behavior"),
            Self::Billing => write!(f, "billing"),
            Self::Delay => write!(f, "delay"),
            Self::CancellationIssue => write!(f, "cancellation_issue"),
            Self::RefundIssue => write!(f, "refund_issue"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Complaint priority; ordering is by urgency
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintPriority {
    /// Routine
    Low,
    /// Default
    Medium,
    /// Needs same-day attention
    High,
    /// Immediate escalation
    Critical,
}

impl fmt::Display for ComplaintPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Complaint workflow status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    /// Awaiting first response
    Open,
    /// Being worked
    InProgress,
    /// Resolution recorded
    Resolved,
    /// Closed after resolution
    Closed,
    /// Escalated past first-line support
    Escalated,
}

impl ComplaintStatus {
    /// Statuses the SLA scanner watches.
    #[must_use]
    pub const fn is_sla_tracked(self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Resolved => write!(f, "resolved"),
            Self::Closed => write!(f, "closed"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

/// A filed complaint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    /// Complaint id
    pub id: ComplaintId,
    /// Filing user
    pub user_ref: UserId,
    /// Related booking, if any
    pub booking_ref: Option<BookingId>,
    /// Session the complaint was filed from, if conversational
    pub session_ref: Option<SessionId>,
    /// Category
    pub complaint_type: ComplaintType,
    /// One-line subject
    pub subject: String,
    /// Full description
    pub description: String,
    /// Derived priority
    pub priority: ComplaintPriority,
    /// Workflow status
    pub status: ComplaintStatus,
    /// Assigned staff member, if any
    pub assigned_staff: Option<StaffId>,
    /// Resolution text once resolved
    pub resolution: Option<String>,
    /// Lexicon sentiment of the description in [-1, 1]
    pub sentiment: f32,
    /// Absolute first-response deadline
    pub response_due_at: DateTime<Utc>,
    /// Absolute resolution deadline
    pub resolution_due_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A complaint awaiting insert; id assigned by the repository.
#[derive(Clone, Debug)]
pub struct NewComplaint {
    /// Filing user
    pub user_ref: UserId,
    /// Related booking, if any
    pub booking_ref: Option<BookingId>,
    /// Session the complaint was filed from
    pub session_ref: Option<SessionId>,
    /// Category
    pub complaint_type: ComplaintType,
    /// One-line subject
    pub subject: String,
    /// Full description
    pub description: String,
    /// Derived priority
    pub priority: ComplaintPriority,
    /// Lexicon sentiment of the description in [-1, 1]
    pub sentiment: f32,
    /// Absolute first-response deadline
    pub response_due_at: DateTime<Utc>,
    /// Absolute resolution deadline
    pub resolution_due_at: DateTime<Utc>,
    /// Creation timestamp from the caller's clock
    pub created_at: DateTime<Utc>,
}

/// Append-only status-change record on a complaint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplaintUpdate {
    /// Complaint this update belongs to
    pub complaint_id: ComplaintId,
    /// Acting staff member; `None` for system transitions
    pub actor: Option<StaffId>,
    /// Status before the change
    pub old_status: ComplaintStatus,
    /// Status after the change
    pub new_status: ComplaintStatus,
    /// Free-text note
    pub note: Option<String>,
    /// When recorded
    pub created_at: DateTime<Utc>,
}

/// Filter for complaint listings
#[derive(Clone, Debug, Default)]
pub struct ComplaintFilter {
    /// Restrict to a status
    pub status: Option<ComplaintStatus>,
    /// Restrict to a priority
    pub priority: Option<ComplaintPriority>,
    /// `Some(true)`: only assigned, `Some(false)`: only unassigned
    pub assigned: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(ComplaintPriority::Critical > ComplaintPriority::High);
        assert!(ComplaintPriority::High > ComplaintPriority::Medium);
        assert!(ComplaintPriority::Medium > ComplaintPriority::Low);
    }

    #[test]
    fn test_sla_tracked_statuses() {
        assert!(ComplaintStatus::Open.is_sla_tracked());
        assert!(ComplaintStatus::InProgress.is_sla_tracked());
        assert!(!ComplaintStatus::Resolved.is_sla_tracked());
        assert!(!ComplaintStatus::Closed.is_sla_tracked());
        assert!(!ComplaintStatus::Escalated.is_sla_tracked());
    }
}
