//! Operational alerts.
//!
//! Alerts are deduplicated on `(kind, resource.kind, resource.id)` within a
//! configured window (default 24 h) and auto-expire when `expires_at`
//! elapses; expired alerts are excluded from listings.

use super::ids::{AlertId, StaffId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Alert kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// SLA deadline within the configured buffer
    SlaAtRisk,
    /// SLA deadline passed
    SlaBreach,
    /// New critical-priority complaint
    CriticalComplaint,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlaAtRisk => write!(f, "sla_at_risk"),
            Self::SlaBreach => write!(f, "sla_breach"),
            Self::CriticalComplaint => write!(f, "critical_complaint"),
        }
    }
}

/// Alert severity
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational
    Info,
    /// Needs attention soon
    Warning,
    /// Needs attention now
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Kind of resource an alert or audit entry points at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A complaint
    Complaint,
    /// A booking
    Booking,
    /// A session
    Session,
    /// An alert itself (audit targets)
    Alert,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complaint => write!(f, "complaint"),
            Self::Booking => write!(f, "booking"),
            Self::Session => write!(f, "session"),
            Self::Alert => write!(f, "alert"),
        }
    }
}

/// Reference to the resource an alert is about
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource kind
    pub kind: ResourceKind,
    /// Stringified resource id
    pub id: String,
}

impl ResourceRef {
    /// Build a reference from a kind and a displayable id.
    #[must_use]
    pub fn new(kind: ResourceKind, id: impl fmt::Display) -> Self {
        Self { kind, id: id.to_string() }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A persisted operational alert
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert id
    pub id: AlertId,
    /// Alert kind; part of the dedup key
    pub kind: AlertKind,
    /// Severity
    pub severity: AlertSeverity,
    /// One-line title
    pub title: String,
    /// Full message
    pub message: String,
    /// Resource the alert is about; part of the dedup key
    pub resource: ResourceRef,
    /// Targeted staff member; `None` broadcasts to all staff
    pub staff_ref: Option<StaffId>,
    /// Read flag
    pub is_read: bool,
    /// Dismissed flag
    pub is_dismissed: bool,
    /// Structured extras
    pub metadata: HashMap<String, serde_json::Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// When marked read
    pub read_at: Option<DateTime<Utc>>,
    /// When dismissed
    pub dismissed_at: Option<DateTime<Utc>>,
    /// Auto-expiry; expired alerts are excluded from listings
    pub expires_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Whether the alert has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// An alert awaiting insert; id assigned by the repository.
#[derive(Clone, Debug)]
pub struct NewAlert {
    /// Alert kind
    pub kind: AlertKind,
    /// Severity
    pub severity: AlertSeverity,
    /// One-line title
    pub title: String,
    /// Full message
    pub message: String,
    /// Resource the alert is about
    pub resource: ResourceRef,
    /// Targeted staff member; `None` broadcasts
    pub staff_ref: Option<StaffId>,
    /// Structured extras
    pub metadata: HashMap<String, serde_json::Value>,
    /// Creation timestamp from the caller's clock
    pub created_at: DateTime<Utc>,
    /// Auto-expiry
    pub expires_at: Option<DateTime<Utc>>,
}

/// Filter for alert listings
#[derive(Clone, Debug, Default)]
pub struct AlertFilter {
    /// Staff view: rows targeted at this staff member plus broadcast rows
    pub staff: Option<StaffId>,
    /// Restrict to a kind
    pub kind: Option<AlertKind>,
    /// Restrict to a severity
    pub severity: Option<AlertSeverity>,
    /// Exclude read rows
    pub unread_only: bool,
    /// Include dismissed rows (excluded by default)
    pub include_dismissed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_alert_expiry() {
        let now = Utc::now();
        let alert = Alert {
            id: AlertId::new(1),
            kind: AlertKind::SlaBreach,
            severity: AlertSeverity::Critical,
            title: "SLA breached".to_string(),
            message: "Complaint 9 missed its response deadline".to_string(),
            resource: ResourceRef::new(ResourceKind::Complaint, 9),
            staff_ref: None,
            is_read: false,
            is_dismissed: false,
            metadata: HashMap::new(),
            created_at: now,
            read_at: None,
            dismissed_at: None,
            expires_at: Some(now + Duration::hours(72)),
        };
        assert!(!alert.is_expired(now));
        assert!(alert.is_expired(now + Duration::hours(72)));
    }

    #[test]
    fn test_resource_ref_display() {
        let r = ResourceRef::new(ResourceKind::Complaint, 42);
        assert_eq!(r.to_string(), "complaint:42");
    }
}
