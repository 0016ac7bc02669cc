//! Complaint slot-filling machine.
//!
//! Slot order: issue type → related booking (optional, skippable) →
//! description (at least 20 characters) → confirm → commit. Priority is
//! derived at commit from urgency keywords, the issue type and the
//! description's sentiment; SLA deadlines come from the policy table and
//! are stored as absolute timestamps.

use super::{
    failures_exhausted, next_failure_count, WorkflowDeps, ABORT_REPLY, CONFIRM_ABORT_REPLY,
};
use crate::outcome::AgentOutcome;
use convergeai_core::error::{CoreError, ErrorKind};
use convergeai_core::types::complaint::{ComplaintPriority, ComplaintType, NewComplaint};
use convergeai_core::types::ids::{SessionId, UserId};
use convergeai_core::types::workflow::{ComplaintDraft, WorkflowState};
use convergeai_nlu::{is_affirmative, sentiment_score, Entities};
use serde_json::Value;
use tracing::{info, warn};

/// Minimum description length accepted.
const MIN_DESCRIPTION_LEN: usize = 20;

/// Keywords that bump priority to high.
const URGENCY_KEYWORDS: [&str; 3] = ["urgent", "immediately", "emergency"];

/// Keyword that bumps priority to critical.
const LEGAL_KEYWORD: &str = "legal";

/// Sentiment at or below which service-quality complaints become high.
const HIGH_SENTIMENT_THRESHOLD: f32 = -0.5;

/// Sentiment at or below which any complaint becomes critical.
const CRITICAL_SENTIMENT_THRESHOLD: f32 = -0.8;

/// Create a fresh draft, seeded with a booking reference when present.
#[must_use]
pub fn start_complaint_draft(entities: &Entities) -> ComplaintDraft {
    let mut draft = ComplaintDraft::default();
    if let Some(booking_id) = entities.booking_id {
        draft.related_booking_id = Some(booking_id);
        draft.related_booking_answered = true;
    }
    draft
}

fn all_required_set(draft: &ComplaintDraft) -> bool {
    draft.issue_type.is_some() && draft.related_booking_answered && draft.description.is_some()
}

/// Parse an issue type from a reply: numbered choice or keyword.
fn parse_issue_type(utterance: &str) -> Option<ComplaintType> {
    let trimmed = utterance.trim().trim_end_matches('.');
    if let Ok(choice) = trimmed.parse::<usize>() {
        return choice.checked_sub(1).and_then(|i| ComplaintType::ALL.get(i)).copied();
    }
    let lower = utterance.to_lowercase();
    if lower.contains("quality") || lower.contains("badly done") || lower.contains("shoddy") {
        Some(ComplaintType::ServiceQuality)
    } else if lower.contains("behav") || lower.contains("rude") || lower.contains("misbehav") {
        Some(ComplaintType::ProviderBehavior)
    } else if lower.contains("bill") || lower.contains("charge") || lower.contains("overcharg") {
        Some(ComplaintType::Billing)
    } else if lower.contains("late") || lower.contains("delay") || lower.contains("no show")
        || lower.contains("no-show")
    {
        Some(ComplaintType::Delay)
    } else if lower.contains("cancel") {
        Some(ComplaintType::CancellationIssue)
    } else if lower.contains("refund") {
        Some(ComplaintType::RefundIssue)
    } else if lower.contains("other") || lower.contains("something else") {
        Some(ComplaintType::Other)
    } else {
        None
    }
}

fn issue_type_prompt() -> String {
    let mut lines = vec!["What kind of issue are you facing?".to_string()];
    for (i, t) in ComplaintType::ALL.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, t.label()));
    }
    lines.push("Reply with a number or a few words.".to_string());
    lines.join("\n")
}

pub(crate) async fn step(
    deps: &WorkflowDeps,
    session_id: &SessionId,
    user_ref: UserId,
    mut draft: ComplaintDraft,
    utterance: &str,
    entities: &Entities,
) -> AgentOutcome {
    if all_required_set(&draft) {
        return confirmation_turn(deps, session_id, user_ref, draft, utterance).await;
    }

    let mut issue_filled_this_turn = false;
    if draft.issue_type.is_none() {
        draft.issue_type = parse_issue_type(utterance);
        if draft.issue_type.is_none() {
            return AgentOutcome::reply(issue_type_prompt(), "complaint_slot_prompt")
                .with_workflow(WorkflowState::ComplaintDraft(draft));
        }
        issue_filled_this_turn = true;
    }

    if !draft.related_booking_answered {
        // A bare number answers the booking prompt, but not the turn that
        // just picked an issue type by number.
        let bare_reference = if issue_filled_this_turn {
            None
        } else {
            utterance
                .trim()
                .trim_start_matches('#')
                .parse::<u64>()
                .ok()
                .map(convergeai_core::types::ids::BookingId::new)
        };
        if let Some(booking_id) = entities
            .booking_id
            .or(draft.related_booking_id)
            .or(bare_reference)
        {
            match deps.bookings.get(booking_id).await {
                Ok(Some(booking)) if booking.user_ref == user_ref => {
                    draft.related_booking_id = Some(booking_id);
                    draft.related_booking_answered = true;
                },
                Ok(_) => {
                    draft.related_booking_id = None;
                    draft.validator_failures = next_failure_count(draft.validator_failures);
                    if failures_exhausted(draft.validator_failures) {
                        return AgentOutcome::reply(ABORT_REPLY, "workflow_aborted");
                    }
                    return AgentOutcome::reply(
                        "I couldn't find that booking on your account. Share the booking \
                         number again, or say \"no\" if this isn't about a booking.",
                        "complaint_slot_reprompt",
                    )
                    .with_workflow(WorkflowState::ComplaintDraft(draft));
                },
                Err(error) => return upstream_failure(draft, error),
            }
        } else {
            let lower = utterance.trim().to_lowercase();
            if matches!(lower.as_str(), "no" | "none" | "skip" | "not really" | "n/a") {
                draft.related_booking_answered = true;
            } else {
                return AgentOutcome::reply(
                    "Is this about a specific booking? Share the booking number, or say \
                     \"no\" to skip.",
                    "complaint_slot_prompt",
                )
                .with_workflow(WorkflowState::ComplaintDraft(draft));
            }
        }
        if !all_required_set(&draft) && draft.description.is_none() {
            return AgentOutcome::reply(
                "Please describe what happened in a few sentences.",
                "complaint_slot_prompt",
            )
            .with_workflow(WorkflowState::ComplaintDraft(draft));
        }
    }

    if draft.description.is_none() {
        let trimmed = utterance.trim();
        if trimmed.len() < MIN_DESCRIPTION_LEN {
            draft.validator_failures = next_failure_count(draft.validator_failures);
            if failures_exhausted(draft.validator_failures) {
                return AgentOutcome::reply(ABORT_REPLY, "workflow_aborted");
            }
            return AgentOutcome::reply(
                "Could you add a little more detail? A couple of sentences (at least 20 \
                 characters) helps us resolve this faster.",
                "complaint_slot_reprompt",
            )
            .with_workflow(WorkflowState::ComplaintDraft(draft));
        }
        draft.description = Some(trimmed.to_string());
        draft.validator_failures = 0;
    }

    summary_outcome(draft)
}

fn summary_outcome(draft: ComplaintDraft) -> AgentOutcome {
    let issue = draft.issue_type.map(ComplaintType::label).unwrap_or("other");
    let booking = draft
        .related_booking_id
        .map_or_else(|| "none".to_string(), |b| b.to_string());
    let description = draft.description.clone().unwrap_or_default();
    AgentOutcome::reply(
        format!(
            "Here's your complaint:\n- Issue: {issue}\n- Related booking: {booking}\n- \
             Details: {description}\nShall I file it? (yes/no)"
        ),
        "complaint_confirm_requested",
    )
    .with_workflow(WorkflowState::ComplaintDraft(draft))
}

async fn confirmation_turn(
    deps: &WorkflowDeps,
    session_id: &SessionId,
    user_ref: UserId,
    mut draft: ComplaintDraft,
    utterance: &str,
) -> AgentOutcome {
    if is_affirmative(utterance) {
        return commit(deps, session_id, user_ref, draft).await;
    }
    if draft.confirm_attempts == 0 {
        draft.confirm_attempts = 1;
        let mut outcome = summary_outcome(draft);
        outcome.reply_text = format!(
            "{}\nPlease reply \"yes\" to file the complaint.",
            outcome.reply_text
        );
        outcome.action_taken = "complaint_confirm_reprompt".to_string();
        return outcome;
    }
    AgentOutcome::reply(CONFIRM_ABORT_REPLY, "workflow_aborted")
}

/// Derive the final priority from keywords, issue type and sentiment.
fn derive_priority(
    issue_type: ComplaintType,
    description: &str,
    sentiment: f32,
) -> ComplaintPriority {
    let lower = description.to_lowercase();
    let mut priority = ComplaintPriority::Medium;

    let urgent = URGENCY_KEYWORDS.iter().any(|k| lower.contains(k));
    if urgent
        || issue_type == ComplaintType::RefundIssue
        || (issue_type == ComplaintType::ServiceQuality && sentiment <= HIGH_SENTIMENT_THRESHOLD)
    {
        priority = ComplaintPriority::High;
    }
    if sentiment <= CRITICAL_SENTIMENT_THRESHOLD || lower.contains(LEGAL_KEYWORD) {
        priority = ComplaintPriority::Critical;
    }
    priority
}

async fn commit(
    deps: &WorkflowDeps,
    session_id: &SessionId,
    user_ref: UserId,
    draft: ComplaintDraft,
) -> AgentOutcome {
    match try_commit(deps, session_id, user_ref, &draft).await {
        Ok(outcome) => outcome,
        Err(error) => match error {
            CoreError::SlaPolicyMissing { complaint_type, priority } => {
                warn!(%complaint_type, %priority, "no SLA policy row, complaint not filed");
                AgentOutcome::reply(
                    "I couldn't file this complaint automatically - our support team has \
                     been notified and will reach out directly.",
                    "complaint_rejected",
                )
                .with_error(ErrorKind::BusinessRule)
            },
            error if error.is_retryable() => upstream_failure(draft, error),
            error => {
                warn!(%error, "complaint commit failed");
                AgentOutcome::failed(error.kind(), "complaint_commit_failed")
            },
        },
    }
}

async fn try_commit(
    deps: &WorkflowDeps,
    session_id: &SessionId,
    user_ref: UserId,
    draft: &ComplaintDraft,
) -> Result<AgentOutcome, CoreError> {
    let issue_type = draft
        .issue_type
        .ok_or_else(|| CoreError::Invariant("complaint commit without issue type".to_string()))?;
    let description = draft
        .description
        .clone()
        .ok_or_else(|| CoreError::Invariant("complaint commit without description".to_string()))?;

    let sentiment = sentiment_score(&description);
    let mut priority = derive_priority(issue_type, &description, sentiment);
    if let Some(severity) = draft.severity {
        priority = priority.max(severity);
    }

    let now = deps.clock.now();
    let (response_due_at, resolution_due_at) = deps
        .policies
        .sla
        .deadlines(priority, now)
        .ok_or(CoreError::SlaPolicyMissing { complaint_type: issue_type, priority })?;

    let subject = format!("{} complaint", issue_type.label());
    let complaint = deps
        .complaints
        .insert(NewComplaint {
            user_ref,
            booking_ref: draft.related_booking_id,
            session_ref: Some(session_id.clone()),
            complaint_type: issue_type,
            subject,
            description,
            priority,
            sentiment,
            response_due_at,
            resolution_due_at,
            created_at: now,
        })
        .await?;

    info!(complaint = %complaint.id, %priority, "complaint filed");
    Ok(AgentOutcome::reply(
        format!(
            "Your complaint is filed - ticket #{} ({} priority). We'll respond by {}.",
            complaint.id,
            priority,
            complaint.response_due_at.format("%Y-%m-%d %H:%M UTC"),
        ),
        "complaint_committed",
    )
    .with_metadata("complaint_id", Value::from(complaint.id.value()))
    .with_metadata("priority", Value::from(priority.to_string()))
    .with_metadata("sentiment", Value::from(f64::from(sentiment))))
}

fn upstream_failure(draft: ComplaintDraft, error: CoreError) -> AgentOutcome {
    warn!(%error, "complaint workflow upstream failure, draft preserved");
    AgentOutcome::failed(error.kind(), "complaint_workflow_failed")
        .with_workflow(WorkflowState::ComplaintDraft(draft))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_default_is_medium() {
        let p = derive_priority(
            ComplaintType::Billing,
            "the invoice shows an amount different from the app quote",
            0.0,
        );
        assert_eq!(p, ComplaintPriority::Medium);
    }

    #[test]
    fn test_urgency_keyword_bumps_high() {
        let p = derive_priority(
            ComplaintType::Billing,
            "please fix this urgent billing mistake before my next visit",
            0.0,
        );
        assert_eq!(p, ComplaintPriority::High);
    }

    #[test]
    fn test_refund_issue_is_high() {
        let p = derive_priority(
            ComplaintType::RefundIssue,
            "my refund from last week has still not arrived in my account",
            0.0,
        );
        assert_eq!(p, ComplaintPriority::High);
    }

    #[test]
    fn test_negative_service_quality_is_high() {
        let p = derive_priority(
            ComplaintType::ServiceQuality,
            "the repair was done poorly",
            -0.6,
        );
        assert_eq!(p, ComplaintPriority::High);
    }

    #[test]
    fn test_very_negative_sentiment_is_critical() {
        let p = derive_priority(
            ComplaintType::Delay,
            "absolutely unacceptable experience",
            -0.9,
        );
        assert_eq!(p, ComplaintPriority::Critical);
    }

    #[test]
    fn test_legal_keyword_is_critical() {
        let p = derive_priority(
            ComplaintType::Other,
            "I will take legal action if this is not resolved this week",
            0.0,
        );
        assert_eq!(p, ComplaintPriority::Critical);
    }

    #[test]
    fn test_parse_issue_type() {
        assert_eq!(parse_issue_type("2"), Some(ComplaintType::ProviderBehavior));
        assert_eq!(parse_issue_type("the technician was rude"), Some(ComplaintType::ProviderBehavior));
        assert_eq!(parse_issue_type("billing problem"), Some(ComplaintType::Billing));
        assert_eq!(parse_issue_type("refund missing"), Some(ComplaintType::RefundIssue));
        assert_eq!(parse_issue_type("xyzzy"), None);
        assert_eq!(parse_issue_type("9"), None);
    }
}
