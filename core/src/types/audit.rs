//! Operations audit log entries.
//!
//! Every alert write and every user-visible ops list read is recorded
//! append-only. Entries flag whether personally identifiable information was
//! accessed.

use super::alert::ResourceRef;
use super::ids::StaffId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One append-only audit record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Acting staff member; `None` for background scanners
    pub staff_ref: Option<StaffId>,
    /// Action performed, e.g. `alert_created`, `alerts_listed`
    pub action: String,
    /// Resource acted on
    pub resource: ResourceRef,
    /// Whether the action exposed personally identifiable information
    pub pii_accessed: bool,
    /// When the action happened
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// Record an alert write performed by a scanner or staff member.
    #[must_use]
    pub fn alert_write(
        staff_ref: Option<StaffId>,
        action: impl Into<String>,
        resource: ResourceRef,
        at: DateTime<Utc>,
    ) -> Self {
        Self { staff_ref, action: action.into(), resource, pii_accessed: false, at }
    }

    /// Record an ops list read; listing surfaces user data.
    #[must_use]
    pub fn ops_read(
        staff_ref: Option<StaffId>,
        action: impl Into<String>,
        resource: ResourceRef,
        at: DateTime<Utc>,
    ) -> Self {
        Self { staff_ref, action: action.into(), resource, pii_accessed: true, at }
    }
}
