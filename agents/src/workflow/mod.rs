//! Slot-filling workflow engine.
//!
//! One state machine per [`WorkflowState`] variant. Each machine declares
//! its required slot order, extracts as many slots as possible from every
//! turn (fixed-point), validates after each extraction, prompts for the
//! first still-unset slot, and runs a confirmation step before commit.
//!
//! Failure semantics:
//! - validator failures produce a targeted reprompt with the specific
//!   reason; three consecutive failures on the same slot abort the
//!   workflow and clear the draft,
//! - a non-affirmative reply at the confirmation step re-asks once, then
//!   the workflow aborts with a cancellation message,
//! - commits happen only on an explicit affirmative confirmation turn.

mod booking;
mod cancellation;
mod complaint;

use crate::outcome::AgentOutcome;
use convergeai_core::clock::Clock;
use convergeai_core::config::PolicyTables;
use convergeai_core::repo::{AddressRepo, BookingRepo, CatalogRepo, ComplaintRepo};
use convergeai_core::types::ids::{SessionId, UserId};
use convergeai_core::types::workflow::WorkflowState;
use convergeai_nlu::Entities;
use std::sync::Arc;
use tracing::{info, instrument};

pub use booking::start_booking_draft;
pub use cancellation::start_cancellation_draft;
pub use complaint::start_complaint_draft;

/// Reply sent when a workflow aborts after repeated failures.
pub const ABORT_REPLY: &str =
    "I wasn't able to complete that with the details provided - let's try again later.";

/// Reply sent when the user declines the confirmation twice.
pub const CONFIRM_ABORT_REPLY: &str =
    "No problem, I've discarded that request. Is there anything else I can help with?";

/// Maximum consecutive validator failures on one slot before aborting.
pub const MAX_VALIDATOR_FAILURES: u8 = 3;

/// Dependencies shared by every workflow machine
pub struct WorkflowDeps {
    /// Service catalog reads
    pub catalog: Arc<dyn CatalogRepo>,
    /// Address reads
    pub addresses: Arc<dyn AddressRepo>,
    /// Booking reads and commits
    pub bookings: Arc<dyn BookingRepo>,
    /// Complaint commits
    pub complaints: Arc<dyn ComplaintRepo>,
    /// Injected clock
    pub clock: Arc<dyn Clock>,
    /// Config-loaded business policy
    pub policies: PolicyTables,
}

/// Runs the machine matching the active workflow variant
pub struct WorkflowEngine {
    deps: Arc<WorkflowDeps>,
}

impl WorkflowEngine {
    /// Create an engine over the shared dependencies.
    #[must_use]
    pub const fn new(deps: Arc<WorkflowDeps>) -> Self {
        Self { deps }
    }

    /// Shared dependencies, for agents that seed drafts.
    #[must_use]
    pub fn deps(&self) -> Arc<WorkflowDeps> {
        Arc::clone(&self.deps)
    }

    /// Advance the active workflow by one user turn.
    #[instrument(skip_all, fields(session = %session_id, kind = %state.kind()))]
    pub async fn handle_turn(
        &self,
        session_id: &SessionId,
        user_ref: UserId,
        state: WorkflowState,
        utterance: &str,
        entities: &Entities,
    ) -> AgentOutcome {
        match state {
            WorkflowState::BookingDraft(draft) => {
                booking::step(&self.deps, session_id, user_ref, draft, utterance, entities)
                    .await
            },
            WorkflowState::CancellationDraft(draft) => {
                cancellation::step(&self.deps, user_ref, draft, utterance, entities).await
            },
            WorkflowState::ComplaintDraft(draft) => {
                complaint::step(&self.deps, session_id, user_ref, draft, utterance, entities)
                    .await
            },
            WorkflowState::RescheduleDraft(_) => {
                // Stored by an earlier release; the commit path no longer exists.
                info!("clearing persisted reschedule draft");
                AgentOutcome::reply(
                    "Rescheduling isn't supported here yet. Please cancel and book \
                     again, or contact support.",
                    "reschedule_unsupported",
                )
            },
        }
    }
}

/// Outcome of a validator failure: targeted reprompt or abort.
///
/// `failures` is the draft's consecutive-failure counter *after* this
/// failure; callers store the returned value back into the draft.
pub(crate) fn next_failure_count(current: u8) -> u8 {
    current.saturating_add(1)
}

/// True when one more failure must abort the workflow.
pub(crate) const fn failures_exhausted(failures: u8) -> bool {
    failures >= MAX_VALIDATOR_FAILURES
}
