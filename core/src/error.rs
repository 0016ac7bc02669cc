//! Error taxonomy for the ConvergeAI core.
//!
//! Errors are classified into five kinds that drive handling policy:
//! user-input errors become targeted reprompts inside the current workflow
//! slot, business-rule errors terminate the workflow with the specific
//! reason, upstream errors are retried once and then surfaced as a transient
//! reply with the draft preserved, invariant violations abort the turn with
//! a full trace and no partial writes, and deadline errors surface as a
//! transient reply.
//!
//! Agents never raise past the coordinator: they return a failed outcome
//! carrying the error kind, and the coordinator maps kind to reply template.

use crate::types::catalog::Pincode;
use crate::types::complaint::{ComplaintPriority, ComplaintType};
use crate::types::booking::BookingStatus;
use crate::types::ids::{AlertId, BookingId, ComplaintId, SessionId};
use thiserror::Error;

/// Handling class of a [`CoreError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid user input; reprompt within the current slot
    UserInput,
    /// Business rule rejected the operation; terminate the workflow
    BusinessRule,
    /// External collaborator failed; retry once, then transient reply
    Upstream,
    /// Programming error; abort the turn, log a full trace
    Invariant,
    /// An external call exceeded its deadline
    Deadline,
}

/// Unified error type for the core
#[derive(Debug, Error)]
pub enum CoreError {
    /// Session id not found or closed
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Booking id not found or not visible to the user
    #[error("booking not found: {0}")]
    BookingNotFound(BookingId),

    /// Complaint id not found
    #[error("complaint not found: {0}")]
    ComplaintNotFound(ComplaintId),

    /// Alert id not found
    #[error("alert not found: {0}")]
    AlertNotFound(AlertId),

    /// A workflow slot value failed validation
    #[error("invalid value for slot {slot}: {reason}")]
    InvalidSlotValue {
        /// Slot that rejected the value
        slot: String,
        /// Human-readable reason, suitable for a reprompt
        reason: String,
    },

    /// No active and verified provider serves the pincode for the subcategory
    #[error("no serviceable provider at pincode {pincode}")]
    NoServiceableProvider {
        /// Pincode that failed the serviceability check
        pincode: Pincode,
    },

    /// The booking status does not admit cancellation
    #[error("booking cannot be cancelled from status {status}")]
    BookingNotCancellable {
        /// Current booking status
        status: BookingStatus,
    },

    /// No SLA policy row for the complaint type and priority
    #[error("no SLA policy for {complaint_type}/{priority}")]
    SlaPolicyMissing {
        /// Complaint type looked up
        complaint_type: ComplaintType,
        /// Priority looked up
        priority: ComplaintPriority,
    },

    /// LLM provider unavailable or returned an error
    #[error("llm unavailable: {0}")]
    LlmUnavailable(String),

    /// Vector store unavailable or returned an error
    #[error("vector store unavailable: {0}")]
    VectorStoreUnavailable(String),

    /// Embedding call failed
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    /// Transient datastore failure
    #[error("transient database error: {0}")]
    DatabaseTransient(String),

    /// An external call exceeded its deadline
    #[error("deadline exceeded during {operation}")]
    DeadlineExceeded {
        /// Operation that timed out
        operation: String,
    },

    /// Invariant violation; a programming error, never user-caused
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl CoreError {
    /// Handling class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound(_)
            | Self::BookingNotFound(_)
            | Self::ComplaintNotFound(_)
            | Self::AlertNotFound(_)
            | Self::InvalidSlotValue { .. } => ErrorKind::UserInput,
            Self::NoServiceableProvider { .. }
            | Self::BookingNotCancellable { .. }
            | Self::SlaPolicyMissing { .. } => ErrorKind::BusinessRule,
            Self::LlmUnavailable(_)
            | Self::VectorStoreUnavailable(_)
            | Self::EmbeddingFailed(_)
            | Self::DatabaseTransient(_) => ErrorKind::Upstream,
            Self::DeadlineExceeded { .. } => ErrorKind::Deadline,
            Self::Invariant(_) => ErrorKind::Invariant,
        }
    }

    /// Whether a single retry is warranted (upstream kind only).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Upstream)
    }
}

/// Convenience result alias used across the core crates
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ids::SessionId;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            CoreError::SessionNotFound(SessionId::generate()).kind(),
            ErrorKind::UserInput
        );
        assert_eq!(
            CoreError::BookingNotCancellable { status: BookingStatus::Completed }.kind(),
            ErrorKind::BusinessRule
        );
        assert_eq!(
            CoreError::LlmUnavailable("503".to_string()).kind(),
            ErrorKind::Upstream
        );
        assert_eq!(
            CoreError::DeadlineExceeded { operation: "embed".to_string() }.kind(),
            ErrorKind::Deadline
        );
        assert_eq!(
            CoreError::Invariant("role alternation".to_string()).kind(),
            ErrorKind::Invariant
        );
    }

    #[test]
    fn test_only_upstream_is_retryable() {
        assert!(CoreError::DatabaseTransient("pool timeout".to_string()).is_retryable());
        assert!(!CoreError::DeadlineExceeded { operation: "llm".to_string() }.is_retryable());
        assert!(
            !CoreError::InvalidSlotValue {
                slot: "quantity".to_string(),
                reason: "must be 1-10".to_string()
            }
            .is_retryable()
        );
    }
}
