//! Cancellation slot-filling machine.
//!
//! Slot order: booking id → reason → refund mode → confirm → commit. The
//! refund percentage always comes from the configured schedule keyed on
//! hours remaining until the scheduled service time.

use super::{
    failures_exhausted, next_failure_count, WorkflowDeps, ABORT_REPLY, CONFIRM_ABORT_REPLY,
};
use crate::outcome::AgentOutcome;
use convergeai_core::error::{CoreError, ErrorKind};
use convergeai_core::types::booking::Booking;
use convergeai_core::types::ids::UserId;
use convergeai_core::types::workflow::{CancellationDraft, RefundMode, WorkflowState};
use convergeai_nlu::{is_affirmative, Entities};
use serde_json::Value;
use tracing::{info, warn};

fn all_required_set(draft: &CancellationDraft) -> bool {
    draft.booking_id.is_some() && draft.reason.is_some() && draft.refund_mode.is_some()
}

/// Create a fresh draft, seeded with a booking reference when present.
#[must_use]
pub fn start_cancellation_draft(entities: &Entities) -> CancellationDraft {
    CancellationDraft {
        booking_id: entities.booking_id,
        ..CancellationDraft::default()
    }
}

pub(crate) async fn step(
    deps: &WorkflowDeps,
    user_ref: UserId,
    mut draft: CancellationDraft,
    utterance: &str,
    entities: &Entities,
) -> AgentOutcome {
    if all_required_set(&draft) {
        return confirmation_turn(deps, user_ref, draft, utterance).await;
    }

    // booking id from this turn's entities or the utterance.
    let mut booking_filled_this_turn = false;
    if draft.booking_id.is_none() {
        draft.booking_id = entities.booking_id.or_else(|| {
            utterance
                .trim()
                .trim_start_matches('#')
                .parse()
                .ok()
                .map(convergeai_core::types::ids::BookingId::new)
        });
        booking_filled_this_turn = draft.booking_id.is_some();
    }

    // Validate the booking before asking anything else.
    if let Some(booking_id) = draft.booking_id {
        match load_cancellable(deps, user_ref, booking_id).await {
            Ok(Ok(_)) => draft.validator_failures = 0,
            Ok(Err(reason)) => {
                draft.booking_id = None;
                draft.validator_failures = next_failure_count(draft.validator_failures);
                if failures_exhausted(draft.validator_failures) {
                    return AgentOutcome::reply(ABORT_REPLY, "workflow_aborted");
                }
                return AgentOutcome::reply(reason, "cancellation_slot_reprompt")
                    .with_workflow(WorkflowState::CancellationDraft(draft));
            },
            Err(error) => return upstream_failure(draft, error),
        }
    } else {
        draft.validator_failures = 0;
        return AgentOutcome::reply(
            "Which booking would you like to cancel? Please share the booking number \
             shown in your bookings.",
            "cancellation_slot_prompt",
        )
        .with_workflow(WorkflowState::CancellationDraft(draft));
    }

    if draft.reason.is_none() {
        // The turn that asked to cancel, or supplied the booking number, is
        // not a reason; only a reply to the reason prompt fills this slot.
        if !booking_filled_this_turn
            && entities.booking_id.is_none()
            && !utterance.trim().is_empty()
            && !utterance.to_lowercase().contains("cancel")
        {
            draft.reason = Some(utterance.trim().to_string());
        }
        if draft.reason.is_none() {
            return AgentOutcome::reply(
                "Why are you cancelling? A short reason helps us improve.",
                "cancellation_slot_prompt",
            )
            .with_workflow(WorkflowState::CancellationDraft(draft));
        }
    }

    if draft.refund_mode.is_none() {
        draft.refund_mode = parse_refund_mode(utterance);
        if draft.refund_mode.is_none() {
            return AgentOutcome::reply(
                "Where should any refund go - your original payment method, or your wallet?",
                "cancellation_slot_prompt",
            )
            .with_workflow(WorkflowState::CancellationDraft(draft));
        }
    }

    match summary(deps, user_ref, &draft).await {
        Ok(text) => AgentOutcome::reply(text, "cancellation_confirm_requested")
            .with_workflow(WorkflowState::CancellationDraft(draft)),
        Err(error) => upstream_failure(draft, error),
    }
}

fn parse_refund_mode(utterance: &str) -> Option<RefundMode> {
    let lower = utterance.to_lowercase();
    if lower.contains("wallet") {
        Some(RefundMode::Wallet)
    } else if lower.contains("original") || lower.contains("card") || lower.contains("bank") {
        Some(RefundMode::Original)
    } else {
        None
    }
}

async fn confirmation_turn(
    deps: &WorkflowDeps,
    user_ref: UserId,
    mut draft: CancellationDraft,
    utterance: &str,
) -> AgentOutcome {
    if is_affirmative(utterance) {
        return commit(deps, user_ref, draft).await;
    }
    if draft.confirm_attempts == 0 {
        draft.confirm_attempts = 1;
        let text = match summary(deps, user_ref, &draft).await {
            Ok(text) => text,
            Err(error) => return upstream_failure(draft, error),
        };
        return AgentOutcome::reply(
            format!("{text}\nPlease reply \"yes\" to confirm."),
            "cancellation_confirm_reprompt",
        )
        .with_workflow(WorkflowState::CancellationDraft(draft));
    }
    AgentOutcome::reply(CONFIRM_ABORT_REPLY, "workflow_aborted")
}

/// Load the booking and check it belongs to the user and is cancellable.
/// The outer error is upstream; the inner `Err` is a user-facing reason.
async fn load_cancellable(
    deps: &WorkflowDeps,
    user_ref: UserId,
    booking_id: convergeai_core::types::ids::BookingId,
) -> Result<Result<Booking, String>, CoreError> {
    let Some(booking) = deps.bookings.get(booking_id).await? else {
        return Ok(Err(
            "I couldn't find that booking. Please check the booking number.".to_string(),
        ));
    };
    if booking.user_ref != user_ref {
        return Ok(Err(
            "I couldn't find that booking on your account. Please check the booking number."
                .to_string(),
        ));
    }
    if !booking.status.is_cancellable() {
        return Ok(Err(format!(
            "That booking is {} and can no longer be cancelled online. Please contact \
             support if you need help.",
            booking.status
        )));
    }
    Ok(Ok(booking))
}

/// Hours remaining until the scheduled service start.
fn hours_to_service(deps: &WorkflowDeps, booking: &Booking) -> i64 {
    let scheduled = booking
        .preferred_date
        .and_time(booking.preferred_time)
        .and_utc();
    (scheduled - deps.clock.now()).num_hours()
}

async fn summary(
    deps: &WorkflowDeps,
    user_ref: UserId,
    draft: &CancellationDraft,
) -> Result<String, CoreError> {
    let booking_id = draft
        .booking_id
        .ok_or_else(|| CoreError::Invariant("cancellation summary without booking".to_string()))?;
    let booking = match load_cancellable(deps, user_ref, booking_id).await? {
        Ok(booking) => booking,
        Err(reason) => return Ok(reason),
    };
    let refund_percent = deps
        .policies
        .refund
        .refund_percent(hours_to_service(deps, &booking));
    let refund = booking.total.percent(refund_percent);
    let mode = draft.refund_mode.map(|m| m.to_string()).unwrap_or_default();
    Ok(format!(
        "You're cancelling booking {} ({} on {}). Based on our policy you'll receive a \
         {refund_percent}% refund of {refund} to your {mode}.\nShall I go ahead? (yes/no)",
        booking.booking_number, booking.total, booking.preferred_date,
    ))
}

async fn commit(
    deps: &WorkflowDeps,
    user_ref: UserId,
    draft: CancellationDraft,
) -> AgentOutcome {
    match try_commit(deps, user_ref, &draft).await {
        Ok(outcome) => outcome,
        Err(error) => match error {
            CoreError::BookingNotCancellable { status } => AgentOutcome::reply(
                format!(
                    "That booking is {status} and can no longer be cancelled. Please \
                     contact support if you need help."
                ),
                "cancellation_rejected",
            )
            .with_error(ErrorKind::BusinessRule),
            error if error.is_retryable() => upstream_failure(draft, error),
            error => {
                warn!(%error, "cancellation commit failed");
                AgentOutcome::failed(error.kind(), "cancellation_commit_failed")
            },
        },
    }
}

async fn try_commit(
    deps: &WorkflowDeps,
    user_ref: UserId,
    draft: &CancellationDraft,
) -> Result<AgentOutcome, CoreError> {
    let booking_id = draft
        .booking_id
        .ok_or_else(|| CoreError::Invariant("cancellation commit without booking".to_string()))?;
    let booking = match load_cancellable(deps, user_ref, booking_id).await? {
        Ok(booking) => booking,
        Err(_) => {
            let status = deps
                .bookings
                .get(booking_id)
                .await?
                .map_or(convergeai_core::types::booking::BookingStatus::Cancelled, |b| b.status);
            return Err(CoreError::BookingNotCancellable { status });
        },
    };

    let refund_percent = deps
        .policies
        .refund
        .refund_percent(hours_to_service(deps, &booking));
    let refund = booking.total.percent(refund_percent);
    let reason = draft
        .reason
        .clone()
        .unwrap_or_else(|| "user requested".to_string());

    let cancelled = deps
        .bookings
        .cancel(booking.id, reason, deps.clock.now())
        .await?;
    info!(booking = %cancelled.id, refund_percent, "booking cancelled");

    let mode = draft
        .refund_mode
        .unwrap_or(RefundMode::Original)
        .to_string();
    Ok(AgentOutcome::reply(
        format!(
            "Done - booking {} is cancelled. A {refund_percent}% refund of {refund} will \
             reach your {mode} within 5-7 business days.",
            cancelled.booking_number,
        ),
        "cancellation_committed",
    )
    .with_metadata("booking_id", Value::from(cancelled.id.value()))
    .with_metadata("refund_percent", Value::from(refund_percent))
    .with_metadata("refund_minor", Value::from(refund.minor())))
}

fn upstream_failure(draft: CancellationDraft, error: CoreError) -> AgentOutcome {
    warn!(%error, "cancellation workflow upstream failure, draft preserved");
    AgentOutcome::failed(error.kind(), "cancellation_workflow_failed")
        .with_workflow(WorkflowState::CancellationDraft(draft))
}
