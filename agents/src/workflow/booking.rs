//! Booking slot-filling machine.
//!
//! Slot order: subcategory → rate card → quantity → address → preferred
//! date → preferred time → special instructions (skippable) → confirm →
//! commit. Every turn merges entity extractions into unset slots, then
//! tries a contextual parse of the utterance for the next unset slot,
//! repeating until a fixed point, then prompts for the first still-unset
//! slot.

use super::{
    failures_exhausted, next_failure_count, WorkflowDeps, ABORT_REPLY, CONFIRM_ABORT_REPLY,
};
use crate::outcome::AgentOutcome;
use convergeai_core::config::{business_close, within_business_hours};
use convergeai_core::error::{CoreError, ErrorKind};
use convergeai_core::types::booking::{NewBooking, NewBookingItem};
use convergeai_core::types::catalog::{Address, RateCard, Subcategory};
use convergeai_core::types::ids::{SessionId, UserId};
use convergeai_core::types::workflow::{BookingDraft, BookingSlot, WorkflowState};
use convergeai_nlu::{is_affirmative, parse_bare_quantity, Entities};
use chrono::{Days, Duration, NaiveTime};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

/// Largest bookable quantity per item.
const MAX_QUANTITY: u32 = 10;

/// Create a fresh draft from the opening utterance.
#[must_use]
pub fn start_booking_draft(utterance: &str) -> BookingDraft {
    BookingDraft {
        service_query: Some(utterance.to_string()),
        ..BookingDraft::default()
    }
}

/// All required slots present (instructions count once answered, even if
/// answered with a skip).
fn all_required_set(draft: &BookingDraft) -> bool {
    draft.subcategory_id.is_some()
        && draft.rate_card_id.is_some()
        && draft.quantity.is_some()
        && draft.address_id.is_some()
        && draft.preferred_date.is_some()
        && draft.preferred_time.is_some()
        && draft.special_instructions.is_some()
}

/// First unset slot in required order.
fn first_unset(draft: &BookingDraft) -> Option<BookingSlot> {
    if draft.subcategory_id.is_none() {
        Some(BookingSlot::Subcategory)
    } else if draft.rate_card_id.is_none() {
        Some(BookingSlot::RateCard)
    } else if draft.quantity.is_none() {
        Some(BookingSlot::Quantity)
    } else if draft.address_id.is_none() {
        Some(BookingSlot::Address)
    } else if draft.preferred_date.is_none() {
        Some(BookingSlot::PreferredDate)
    } else if draft.preferred_time.is_none() {
        Some(BookingSlot::PreferredTime)
    } else if draft.special_instructions.is_none() {
        Some(BookingSlot::SpecialInstructions)
    } else {
        None
    }
}

pub(crate) async fn step(
    deps: &WorkflowDeps,
    session_id: &SessionId,
    user_ref: UserId,
    mut draft: BookingDraft,
    utterance: &str,
    entities: &Entities,
) -> AgentOutcome {
    if all_required_set(&draft) {
        return confirmation_turn(deps, session_id, user_ref, draft, utterance).await;
    }

    // Fixed-point extraction over unset slots.
    loop {
        let before = draft.clone();
        merge_entities(&mut draft, entities);
        if let Some(slot) = first_unset(&draft) {
            match contextual_fill(deps, user_ref, &mut draft, slot, utterance).await {
                Ok(()) => {},
                Err(error) => return upstream_failure(draft, error),
            }
        }
        if draft == before {
            break;
        }
    }

    // Validate everything currently set, in slot order.
    match validate(deps, user_ref, &mut draft).await {
        Ok(None) => {},
        Ok(Some(outcome)) => return outcome,
        Err(error) => return upstream_failure(draft, error),
    }

    match first_unset(&draft) {
        Some(slot) => {
            draft.pending_slot = Some(slot);
            let prompt = match prompt_for(deps, &draft, slot).await {
                Ok(p) => p,
                Err(error) => return upstream_failure(draft, error),
            };
            AgentOutcome::reply(prompt, "booking_slot_prompt")
                .with_metadata("pending_slot", Value::from(slot.name()))
                .with_workflow(WorkflowState::BookingDraft(draft))
        },
        None => {
            draft.pending_slot = None;
            match summary(deps, &draft).await {
                Ok(text) => AgentOutcome::reply(text, "booking_confirm_requested")
                    .with_workflow(WorkflowState::BookingDraft(draft)),
                Err(error) => upstream_failure(draft, error),
            }
        },
    }
}

async fn confirmation_turn(
    deps: &WorkflowDeps,
    session_id: &SessionId,
    user_ref: UserId,
    mut draft: BookingDraft,
    utterance: &str,
) -> AgentOutcome {
    if is_affirmative(utterance) {
        draft.confirmed = true;
        return commit(deps, session_id, user_ref, draft).await;
    }
    if draft.confirm_attempts == 0 {
        draft.confirm_attempts = 1;
        let text = match summary(deps, &draft).await {
            Ok(text) => text,
            Err(error) => return upstream_failure(draft, error),
        };
        return AgentOutcome::reply(
            format!("{text}\nPlease reply \"yes\" to confirm, or \"cancel\" to discard."),
            "booking_confirm_reprompt",
        )
        .with_workflow(WorkflowState::BookingDraft(draft));
    }
    info!("booking confirmation declined twice, discarding draft");
    AgentOutcome::reply(CONFIRM_ABORT_REPLY, "workflow_aborted")
}

/// Merge turn entities into unset slots.
fn merge_entities(draft: &mut BookingDraft, entities: &Entities) {
    if draft.subcategory_id.is_none() {
        draft.subcategory_id = entities.subcategory_id;
    }
    if draft.rate_card_id.is_none() {
        draft.rate_card_id = entities.rate_card_id;
    }
    if draft.quantity.is_none() {
        draft.quantity = entities.quantity;
    }
    if draft.preferred_date.is_none() {
        draft.preferred_date = entities.date;
    }
    if draft.preferred_time.is_none() {
        draft.preferred_time = entities.time;
    }
}

/// Contextual parse of the raw utterance for one slot.
async fn contextual_fill(
    deps: &WorkflowDeps,
    user_ref: UserId,
    draft: &mut BookingDraft,
    slot: BookingSlot,
    utterance: &str,
) -> Result<(), CoreError> {
    match slot {
        BookingSlot::Subcategory => {
            let query = draft.service_query.clone().unwrap_or_else(|| utterance.to_string());
            if let Some(sub) = deps.catalog.find_subcategory_by_name(utterance).await? {
                draft.subcategory_id = Some(sub.id);
            } else if let Some(sub) = deps.catalog.find_subcategory_by_name(&query).await? {
                draft.subcategory_id = Some(sub.id);
            }
        },
        BookingSlot::RateCard => {
            let Some(subcategory_id) = draft.subcategory_id else { return Ok(()) };
            let cards = deps.catalog.list_rate_cards(subcategory_id).await?;
            let lower = utterance.to_lowercase();
            if let Some(card) = cards
                .iter()
                .find(|c| lower.contains(&c.name.to_lowercase()))
            {
                draft.rate_card_id = Some(card.id);
            } else if draft.pending_slot == Some(BookingSlot::RateCard) {
                // A numbered pick from the prompted list.
                if let Ok(choice) = utterance.trim().trim_end_matches('.').parse::<usize>() {
                    if let Some(card) = choice.checked_sub(1).and_then(|i| cards.get(i)) {
                        draft.rate_card_id = Some(card.id);
                    }
                }
            }
        },
        BookingSlot::Quantity => {
            if draft.pending_slot == Some(BookingSlot::Quantity) {
                let lower = utterance.trim().to_lowercase();
                if lower == "default" || lower == "skip" {
                    draft.quantity = Some(1);
                } else {
                    draft.quantity = parse_bare_quantity(utterance);
                }
            }
        },
        BookingSlot::Address => {
            if let Some(address) = resolve_address(deps, user_ref, utterance).await? {
                draft.address_id = Some(address.id);
            }
        },
        BookingSlot::PreferredDate | BookingSlot::PreferredTime => {
            // Covered by entity extraction.
        },
        BookingSlot::SpecialInstructions => {
            if draft.pending_slot == Some(BookingSlot::SpecialInstructions) {
                let trimmed = utterance.trim();
                let lower = trimmed.to_lowercase();
                if trimmed.is_empty()
                    || matches!(lower.as_str(), "no" | "none" | "nothing" | "skip" | "nope")
                {
                    draft.special_instructions = Some(String::new());
                } else {
                    draft.special_instructions = Some(trimmed.to_string());
                }
            }
        },
    }
    Ok(())
}

/// Match an utterance against the user's saved addresses.
async fn resolve_address(
    deps: &WorkflowDeps,
    user_ref: UserId,
    utterance: &str,
) -> Result<Option<Address>, CoreError> {
    let addresses = deps.addresses.list_for_user(user_ref).await?;
    if addresses.is_empty() {
        return Ok(None);
    }
    let lower = utterance.to_lowercase();
    let labeled: Vec<&Address> = addresses
        .iter()
        .filter(|a| lower.contains(&a.label.to_lowercase()))
        .collect();
    if labeled.len() == 1 {
        return Ok(Some(labeled[0].clone()));
    }
    if lower.contains("default") || lower.contains("address") || lower.contains("usual") {
        if let Some(default) = deps.addresses.default_for_user(user_ref).await? {
            return Ok(Some(default));
        }
        if addresses.len() == 1 {
            return Ok(Some(addresses[0].clone()));
        }
    }
    Ok(None)
}

/// Validate every set slot in order; returns a reprompt/abort outcome on
/// the first failure, `None` when everything passes.
async fn validate(
    deps: &WorkflowDeps,
    user_ref: UserId,
    draft: &mut BookingDraft,
) -> Result<Option<AgentOutcome>, CoreError> {
    if let Some(id) = draft.subcategory_id {
        let valid = deps
            .catalog
            .get_subcategory(id)
            .await?
            .is_some_and(|s| s.active);
        if !valid {
            draft.subcategory_id = None;
            return Ok(Some(slot_failure(
                draft,
                BookingSlot::Subcategory,
                "I couldn't find that service. Which service do you need?",
            )));
        }
    }
    if let Some(id) = draft.rate_card_id {
        let card = deps.catalog.get_rate_card(id).await?;
        let valid = card
            .as_ref()
            .is_some_and(|c| c.active && Some(c.subcategory_id) == draft.subcategory_id);
        if !valid {
            draft.rate_card_id = None;
            return Ok(Some(slot_failure(
                draft,
                BookingSlot::RateCard,
                "That option isn't available for this service. Please pick one from the list.",
            )));
        }
    }
    if let Some(quantity) = draft.quantity {
        if quantity == 0 || quantity > MAX_QUANTITY {
            draft.quantity = None;
            return Ok(Some(slot_failure(
                draft,
                BookingSlot::Quantity,
                "Quantity must be between 1 and 10. How many units would you like?",
            )));
        }
    }
    if let Some(id) = draft.address_id {
        let address = deps.addresses.get(id).await?;
        let Some(address) = address.filter(|a| a.user_ref == user_ref) else {
            draft.address_id = None;
            return Ok(Some(slot_failure(
                draft,
                BookingSlot::Address,
                "I couldn't find that address on your profile. Which address should we use?",
            )));
        };
        if let Some(subcategory_id) = draft.subcategory_id {
            if !deps
                .catalog
                .is_serviceable(subcategory_id, &address.pincode)
                .await?
            {
                draft.address_id = None;
                return Ok(Some(slot_failure(
                    draft,
                    BookingSlot::Address,
                    "This pincode is not yet serviced; please pick a different address.",
                )));
            }
        }
    }
    if let Some(date) = draft.preferred_date {
        let tomorrow = deps
            .clock
            .now()
            .date_naive()
            .checked_add_days(Days::new(1));
        if tomorrow.is_none_or(|t| date < t) {
            draft.preferred_date = None;
            return Ok(Some(slot_failure(
                draft,
                BookingSlot::PreferredDate,
                "The date must be at least tomorrow. Which date works for you?",
            )));
        }
    }
    if let Some(time) = draft.preferred_time {
        if !within_business_hours(time) {
            draft.preferred_time = None;
            return Ok(Some(slot_failure(
                draft,
                BookingSlot::PreferredTime,
                "We operate between 08:00 and 20:00. What time suits you?",
            )));
        }
    }
    draft.validator_failures = 0;
    Ok(None)
}

/// Targeted reprompt, or abort after three consecutive failures on a slot.
fn slot_failure(draft: &mut BookingDraft, slot: BookingSlot, reason: &str) -> AgentOutcome {
    if draft.pending_slot == Some(slot) {
        draft.validator_failures = next_failure_count(draft.validator_failures);
    } else {
        draft.validator_failures = 1;
    }
    draft.pending_slot = Some(slot);
    if failures_exhausted(draft.validator_failures) {
        warn!(slot = slot.name(), "aborting booking workflow after repeated failures");
        return AgentOutcome::reply(ABORT_REPLY, "workflow_aborted");
    }
    AgentOutcome::reply(reason, "booking_slot_reprompt")
        .with_metadata("pending_slot", Value::from(slot.name()))
        .with_workflow(WorkflowState::BookingDraft(draft.clone()))
}

/// Prompt text for a slot.
async fn prompt_for(
    deps: &WorkflowDeps,
    draft: &BookingDraft,
    slot: BookingSlot,
) -> Result<String, CoreError> {
    Ok(match slot {
        BookingSlot::Subcategory => {
            "What service would you like to book?".to_string()
        },
        BookingSlot::RateCard => {
            let Some(subcategory_id) = draft.subcategory_id else {
                return Ok("Which option would you like?".to_string());
            };
            let name = deps
                .catalog
                .get_subcategory(subcategory_id)
                .await?
                .map_or_else(|| "this service".to_string(), |s| s.name);
            let cards = deps.catalog.list_rate_cards(subcategory_id).await?;
            let mut lines = vec![format!("Here are the options for {name}:")];
            for (i, card) in cards.iter().enumerate() {
                lines.push(format!("{}. {} - {}", i + 1, card.name, card.price));
            }
            lines.push("Which one would you like?".to_string());
            lines.join("\n")
        },
        BookingSlot::Quantity => "How many units? (default 1)".to_string(),
        BookingSlot::Address => {
            "Which address should the professional visit? You can say \"my home address\" \
             or name a saved address."
                .to_string()
        },
        BookingSlot::PreferredDate => {
            "Which date works for you? We can come any day from tomorrow.".to_string()
        },
        BookingSlot::PreferredTime => {
            "What time suits you? We operate between 08:00 and 20:00.".to_string()
        },
        BookingSlot::SpecialInstructions => {
            "Any special instructions for the professional? Say \"no\" to skip.".to_string()
        },
    })
}

/// Confirmation summary of the collected slots.
async fn summary(deps: &WorkflowDeps, draft: &BookingDraft) -> Result<String, CoreError> {
    let (card, subcategory) = load_card_and_subcategory(deps, draft).await?;
    let quantity = draft.quantity.unwrap_or(1);
    let subtotal = card
        .price
        .checked_mul(quantity)
        .ok_or_else(|| CoreError::Invariant("booking subtotal overflow".to_string()))?;
    let date = draft
        .preferred_date
        .map(|d| d.to_string())
        .unwrap_or_default();
    let time = draft
        .preferred_time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default();
    let window_to = window_end(draft.preferred_time, subcategory.default_duration_minutes);
    let instructions = match draft.special_instructions.as_deref() {
        Some("") | None => String::new(),
        Some(text) => format!("\n- Instructions: {text}"),
    };
    Ok(format!(
        "Here's your booking summary:\n- Service: {} ({})\n- Quantity: {}\n- Date: {}\n- \
         Window: {} to {}\n- Subtotal: {}{}\nShall I confirm? (yes/no)",
        subcategory.name,
        card.name,
        quantity,
        date,
        time,
        window_to.format("%H:%M"),
        subtotal,
        instructions,
    ))
}

async fn load_card_and_subcategory(
    deps: &WorkflowDeps,
    draft: &BookingDraft,
) -> Result<(RateCard, Subcategory), CoreError> {
    let card_id = draft
        .rate_card_id
        .ok_or_else(|| CoreError::Invariant("summary without rate card".to_string()))?;
    let card = deps
        .catalog
        .get_rate_card(card_id)
        .await?
        .ok_or_else(|| CoreError::Invariant("validated rate card vanished".to_string()))?;
    let subcategory = deps
        .catalog
        .get_subcategory(card.subcategory_id)
        .await?
        .ok_or_else(|| CoreError::Invariant("validated subcategory vanished".to_string()))?;
    Ok((card, subcategory))
}

/// Scheduled window end: start plus default duration, clamped to closing.
fn window_end(start: Option<NaiveTime>, duration_minutes: u32) -> NaiveTime {
    let close = business_close();
    let Some(start) = start else { return close };
    let (end, wrapped) =
        start.overflowing_add_signed(Duration::minutes(i64::from(duration_minutes)));
    if wrapped != 0 || end > close { close } else { end }
}

/// Commit the confirmed booking.
async fn commit(
    deps: &WorkflowDeps,
    session_id: &SessionId,
    user_ref: UserId,
    draft: BookingDraft,
) -> AgentOutcome {
    match try_commit(deps, user_ref, &draft).await {
        Ok(outcome) => {
            info!(session = %session_id, "booking committed");
            outcome
        },
        Err(error) => match error {
            CoreError::NoServiceableProvider { .. } => {
                // Workflow-terminating business failure; the draft is cleared.
                warn!(session = %session_id, "booking rejected: unserviceable pincode");
                AgentOutcome::reply(
                    "I'm sorry - this pincode is not yet serviced for that service, so I \
                     couldn't place the booking. Please try a different address.",
                    "booking_rejected",
                )
                .with_error(ErrorKind::BusinessRule)
            },
            error if error.is_retryable() => upstream_failure(draft, error),
            error => {
                warn!(session = %session_id, %error, "booking commit failed");
                AgentOutcome::failed(error.kind(), "booking_commit_failed")
            },
        },
    }
}

async fn try_commit(
    deps: &WorkflowDeps,
    user_ref: UserId,
    draft: &BookingDraft,
) -> Result<AgentOutcome, CoreError> {
    let (card, subcategory) = load_card_and_subcategory(deps, draft).await?;
    let address_id = draft
        .address_id
        .ok_or_else(|| CoreError::Invariant("commit without address".to_string()))?;
    let address = deps
        .addresses
        .get(address_id)
        .await?
        .filter(|a| a.user_ref == user_ref)
        .ok_or_else(|| CoreError::Invariant("validated address vanished".to_string()))?;
    let quantity = draft
        .quantity
        .ok_or_else(|| CoreError::Invariant("commit without quantity".to_string()))?;
    let date = draft
        .preferred_date
        .ok_or_else(|| CoreError::Invariant("commit without date".to_string()))?;
    let time = draft
        .preferred_time
        .ok_or_else(|| CoreError::Invariant("commit without time".to_string()))?;

    // Serviceability is re-validated at commit; availability may have
    // changed since the slot was filled.
    if !deps
        .catalog
        .is_serviceable(subcategory.id, &address.pincode)
        .await?
    {
        return Err(CoreError::NoServiceableProvider { pincode: address.pincode });
    }

    let subtotal = card
        .price
        .checked_mul(quantity)
        .ok_or_else(|| CoreError::Invariant("booking subtotal overflow".to_string()))?;
    let total = subtotal;
    let window_to = window_end(Some(time), subcategory.default_duration_minutes);
    let order_id = mint_token("ORD");
    let booking_number = mint_token("BKG");
    let instructions = draft
        .special_instructions
        .clone()
        .filter(|s| !s.is_empty());

    let booking = deps
        .bookings
        .insert_with_items(NewBooking {
            order_id,
            booking_number,
            user_ref,
            address_ref: address.id,
            subtotal,
            total,
            preferred_date: date,
            preferred_time: time,
            special_instructions: instructions,
            created_at: deps.clock.now(),
            items: vec![NewBookingItem {
                rate_card_id: card.id,
                address_ref: address.id,
                service_name: format!("{} - {}", subcategory.name, card.name),
                quantity,
                unit_price: card.price,
                total_amount: subtotal,
                final_amount: total,
                scheduled_date: date,
                scheduled_window_from: time,
                scheduled_window_to: window_to,
            }],
        })
        .await?;

    Ok(AgentOutcome::reply(
        format!(
            "Your booking is confirmed! Booking number {} for {} on {} between {} and {}. \
             Total: {}.",
            booking.booking_number,
            subcategory.name,
            date,
            time.format("%H:%M"),
            window_to.format("%H:%M"),
            total,
        ),
        "booking_committed",
    )
    .with_metadata("booking_id", Value::from(booking.id.value()))
    .with_metadata("order_id", Value::from(booking.order_id.clone()))
    .with_metadata("booking_number", Value::from(booking.booking_number.clone()))
    .with_metadata("total_minor", Value::from(total.minor())))
}

/// Opaque human token, unique process-wide, well under 50 chars.
fn mint_token(prefix: &str) -> String {
    let simple = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{prefix}-{}", &simple[..12])
}

/// Upstream failure: keep the draft so the user can retry the turn.
fn upstream_failure(draft: BookingDraft, error: CoreError) -> AgentOutcome {
    warn!(%error, "booking workflow upstream failure, draft preserved");
    AgentOutcome::failed(error.kind(), "booking_workflow_failed")
        .with_workflow(WorkflowState::BookingDraft(draft))
}
