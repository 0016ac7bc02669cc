//! Canned reply templates used by the coordinator.

use convergeai_core::error::ErrorKind;

/// Greeting reply.
pub const GREETING: &str =
    "Hi there! I can help you book home services, check your bookings, file a complaint, \
     or answer questions about our policies. What can I do for you?";

/// Clarification reply for unclassified turns.
pub const CLARIFY: &str =
    "I'm not sure I understood. You can book a service, check a booking's status, file a \
     complaint, or ask about our policies.";

/// Transient-failure reply for upstream and deadline errors.
pub const TRANSIENT: &str = "I'm having trouble right now, please try again.";

/// Reply for unusable input.
pub const BAD_INPUT: &str = "I didn't quite catch that - could you rephrase?";

/// Generic failure reply.
pub const GENERIC_FAILURE: &str =
    "Something went wrong on our side. Please try again in a moment.";

/// Template for a failed outcome that carried no reply of its own.
#[must_use]
pub const fn for_error_kind(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Upstream | ErrorKind::Deadline => TRANSIENT,
        ErrorKind::UserInput => BAD_INPUT,
        ErrorKind::BusinessRule | ErrorKind::Invariant => GENERIC_FAILURE,
    }
}
