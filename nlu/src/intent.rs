//! Intent labels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified intent of a user utterance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Salutation, no actionable request
    Greeting,
    /// Start or continue booking a service
    Booking,
    /// Move an existing booking (commit unsupported)
    Reschedule,
    /// Cancel an existing booking
    Cancellation,
    /// File a complaint
    Complaint,
    /// Browse or ask about services
    ServiceInquiry,
    /// Ask about policies, terms, refund rules
    PolicyInquiry,
    /// Ask about prices
    PriceInquiry,
    /// Ask about booking status
    StatusInquiry,
    /// Unclassified or low-confidence
    Other,
}

impl Intent {
    /// Stable snake-case label persisted on conversation messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Booking => "booking",
            Self::Reschedule => "reschedule",
            Self::Cancellation => "cancellation",
            Self::Complaint => "complaint",
            Self::ServiceInquiry => "service_inquiry",
            Self::PolicyInquiry => "policy_inquiry",
            Self::PriceInquiry => "price_inquiry",
            Self::StatusInquiry => "status_inquiry",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
