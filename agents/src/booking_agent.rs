//! Booking agent: starts booking workflows, answers status inquiries, and
//! declines reschedule requests (unsupported at commit level).

use crate::outcome::{Agent, AgentContext, AgentOutcome};
use crate::workflow::{start_booking_draft, WorkflowEngine};
use async_trait::async_trait;
use convergeai_core::error::CoreError;
use convergeai_core::repo::Page;
use convergeai_core::types::workflow::WorkflowState;
use convergeai_nlu::Intent;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Bookings shown by the read-only status branch.
const STATUS_LIMIT: u32 = 5;

/// Reply for reschedule requests; the commit path does not exist.
const RESCHEDULE_REPLY: &str =
    "Rescheduling isn't supported here yet. You can cancel the booking and book a new \
     slot, or contact support and we'll arrange it.";

/// Booking specialist
pub struct BookingAgent {
    engine: Arc<WorkflowEngine>,
}

impl BookingAgent {
    /// Create the agent over the shared workflow engine.
    #[must_use]
    pub const fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }

    async fn status_inquiry(&self, ctx: &AgentContext) -> Result<AgentOutcome, CoreError> {
        let deps = self.engine.deps();
        let bookings = deps
            .bookings
            .list_for_user(ctx.user_ref, Page::first(STATUS_LIMIT))
            .await?;
        if bookings.is_empty() {
            return Ok(AgentOutcome::reply(
                "You don't have any bookings yet. Would you like to book a service?",
                "status_reported",
            ));
        }

        let mut lines = vec!["Here are your recent bookings:".to_string()];
        let mut ids = Vec::new();
        for (i, booking) in bookings.iter().enumerate() {
            let items = deps.bookings.items(booking.id).await?;
            let service = items
                .first()
                .map_or_else(|| "service".to_string(), |item| item.service_name.clone());
            lines.push(format!(
                "{}. {} - {} on {} ({})",
                i + 1,
                booking.booking_number,
                service,
                booking.preferred_date,
                booking.status,
            ));
            ids.push(Value::from(booking.id.value()));
        }

        Ok(AgentOutcome::reply(lines.join("\n"), "status_reported")
            .with_metadata("booking_ids", Value::from(ids)))
    }
}

#[async_trait]
impl Agent for BookingAgent {
    fn name(&self) -> &'static str {
        "booking"
    }

    async fn execute(&self, ctx: &AgentContext) -> AgentOutcome {
        match ctx.intent {
            Intent::Booking => {
                let draft = start_booking_draft(&ctx.utterance);
                self.engine
                    .handle_turn(
                        &ctx.session.session_id,
                        ctx.user_ref,
                        WorkflowState::BookingDraft(draft),
                        &ctx.utterance,
                        &ctx.entities,
                    )
                    .await
            },
            Intent::Reschedule => {
                AgentOutcome::reply(RESCHEDULE_REPLY, "reschedule_unsupported")
            },
            Intent::StatusInquiry => match self.status_inquiry(ctx).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(%error, "status inquiry failed");
                    AgentOutcome::failed(error.kind(), "status_failed")
                },
            },
            other => {
                warn!(intent = %other, "booking agent received unexpected intent");
                AgentOutcome::reply(
                    "I can help you book a service or check your bookings - what would \
                     you like to do?",
                    "booking_clarification",
                )
            },
        }
    }
}
