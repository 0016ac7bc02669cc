//! Entity extraction from user utterances.
//!
//! Extractors are regex-based and deterministic. Relative date words
//! ("today", "tomorrow") resolve against a reference date supplied by the
//! caller's clock, never the system clock.

use chrono::{Days, NaiveDate, NaiveTime};
use convergeai_core::types::catalog::Pincode;
use convergeai_core::types::ids::{BookingId, CategoryId, RateCardId, SubcategoryId};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Entities pulled from one utterance
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entities {
    /// Referenced category id
    pub category_id: Option<CategoryId>,
    /// Referenced subcategory id
    pub subcategory_id: Option<SubcategoryId>,
    /// Referenced rate card id
    pub rate_card_id: Option<RateCardId>,
    /// Referenced booking id
    pub booking_id: Option<BookingId>,
    /// Postal pincode
    pub pincode: Option<Pincode>,
    /// Resolved calendar date
    pub date: Option<NaiveDate>,
    /// Clock time
    pub time: Option<NaiveTime>,
    /// Unit quantity
    pub quantity: Option<u32>,
    /// Free-text remainder used as a search query
    pub query: Option<String>,
}

impl Entities {
    /// Flatten into a JSON map for message metadata.
    #[must_use]
    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(v) = self.category_id {
            map.insert("category_id".to_string(), Value::from(v.value()));
        }
        if let Some(v) = self.subcategory_id {
            map.insert("subcategory_id".to_string(), Value::from(v.value()));
        }
        if let Some(v) = self.rate_card_id {
            map.insert("rate_card_id".to_string(), Value::from(v.value()));
        }
        if let Some(v) = self.booking_id {
            map.insert("booking_id".to_string(), Value::from(v.value()));
        }
        if let Some(v) = &self.pincode {
            map.insert("pincode".to_string(), Value::from(v.as_str()));
        }
        if let Some(v) = self.date {
            map.insert("date".to_string(), Value::from(v.to_string()));
        }
        if let Some(v) = self.time {
            map.insert("time".to_string(), Value::from(v.format("%H:%M").to_string()));
        }
        if let Some(v) = self.quantity {
            map.insert("quantity".to_string(), Value::from(v));
        }
        if let Some(v) = &self.query {
            map.insert("query".to_string(), Value::from(v.as_str()));
        }
        map
    }
}

#[allow(clippy::unwrap_used)] // Pattern is a compile-time constant
static PINCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([1-9][0-9]{5})\b").unwrap());

#[allow(clippy::unwrap_used)] // Pattern is a compile-time constant
static BOOKING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:booking|order)\s*(?:id|number|no\.?)?\s*#?\s*(\d{1,18})\b").unwrap());

#[allow(clippy::unwrap_used)] // Pattern is a compile-time constant
static CATALOG_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(category|subcategory|rate\s*card|service|option)\s*#?\s*(\d{1,18})\b")
        .unwrap()
});

#[allow(clippy::unwrap_used)] // Pattern is a compile-time constant
static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:x\s*(\d{1,2})|(\d{1,2})\s*(?:units?|nos?|pieces?|times))\b").unwrap()
});

#[allow(clippy::unwrap_used)] // Pattern is a compile-time constant
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

#[allow(clippy::unwrap_used)] // Pattern is a compile-time constant
static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());

#[allow(clippy::unwrap_used)] // Pattern is a compile-time constant
static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b|\b(\d{1,2}):(\d{2})\b").unwrap());

/// Extract every recognizable entity from `text`.
///
/// `today` anchors relative date words.
#[must_use]
pub fn extract(text: &str, today: NaiveDate) -> Entities {
    let mut entities = Entities {
        pincode: PINCODE
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| Pincode::parse(m.as_str()).ok()),
        booking_id: BOOKING_ID
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .map(BookingId::new),
        quantity: extract_quantity(text),
        date: extract_date(text, today),
        time: extract_time(text),
        ..Entities::default()
    };

    for capture in CATALOG_REF.captures_iter(text) {
        let (Some(kind), Some(id)) = (capture.get(1), capture.get(2)) else {
            continue;
        };
        let Ok(id) = id.as_str().parse::<u64>() else {
            continue;
        };
        match kind.as_str().to_lowercase().replace(char::is_whitespace, "").as_str() {
            "category" => entities.category_id = Some(CategoryId::new(id)),
            "subcategory" | "service" => {
                entities.subcategory_id = Some(SubcategoryId::new(id));
            },
            "ratecard" | "option" => entities.rate_card_id = Some(RateCardId::new(id)),
            _ => {},
        }
    }

    entities
}

fn extract_quantity(text: &str) -> Option<u32> {
    let captures = QUANTITY.captures(text)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

fn extract_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = text.to_lowercase();
    if lower.contains("day after tomorrow") {
        return today.checked_add_days(Days::new(2));
    }
    if lower.contains("tomorrow") {
        return today.checked_add_days(Days::new(1));
    }
    if lower.contains("today") {
        return Some(today);
    }
    if let Some(c) = ISO_DATE.captures(text) {
        let (y, m, d) = (c.get(1)?, c.get(2)?, c.get(3)?);
        return NaiveDate::from_ymd_opt(
            y.as_str().parse().ok()?,
            m.as_str().parse().ok()?,
            d.as_str().parse().ok()?,
        );
    }
    if let Some(c) = SLASH_DATE.captures(text) {
        let (d, m, y) = (c.get(1)?, c.get(2)?, c.get(3)?);
        return NaiveDate::from_ymd_opt(
            y.as_str().parse().ok()?,
            m.as_str().parse().ok()?,
            d.as_str().parse().ok()?,
        );
    }
    None
}

fn extract_time(text: &str) -> Option<NaiveTime> {
    let captures = CLOCK_TIME.captures(text)?;
    if let Some(meridiem) = captures.get(3) {
        let hour: u32 = captures.get(1)?.as_str().parse().ok()?;
        let minute: u32 = captures
            .get(2)
            .map_or(Some(0), |m| m.as_str().parse().ok())?;
        if hour == 0 || hour > 12 {
            return None;
        }
        let hour = match (meridiem.as_str().to_lowercase().as_str(), hour) {
            ("am", 12) => 0,
            ("am", h) => h,
            ("pm", 12) => 12,
            (_, h) => h + 12,
        };
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }
    let hour: u32 = captures.get(4)?.as_str().parse().ok()?;
    let minute: u32 = captures.get(5)?.as_str().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parse a bare quantity reply ("1", "two units") inside a quantity prompt.
#[must_use]
pub fn parse_bare_quantity(text: &str) -> Option<u32> {
    let trimmed = text.trim().trim_end_matches('.');
    if let Ok(n) = trimmed.parse::<u32>() {
        return Some(n);
    }
    match trimmed.to_lowercase().as_str() {
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        _ => extract_quantity(text),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).expect("valid date")
    }

    #[test]
    fn test_scenario_booking_utterance() {
        let entities = extract("I need AC repair tomorrow at 2pm", today());
        assert_eq!(entities.date, NaiveDate::from_ymd_opt(2026, 8, 2));
        assert_eq!(entities.time, NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(entities.quantity, None);
    }

    #[test]
    fn test_pincode_extraction_rejects_leading_zero() {
        assert!(extract("my pincode is 560001", today()).pincode.is_some());
        assert!(extract("pin 056001 here", today()).pincode.is_none());
    }

    #[test]
    fn test_booking_reference() {
        let entities = extract("cancel booking #4021 please", today());
        assert_eq!(entities.booking_id, Some(BookingId::new(4021)));
        let entities = extract("where is order 88", today());
        assert_eq!(entities.booking_id, Some(BookingId::new(88)));
    }

    #[test]
    fn test_catalog_references() {
        let entities = extract("show me rate card 5 in category 2", today());
        assert_eq!(entities.rate_card_id, Some(RateCardId::new(5)));
        assert_eq!(entities.category_id, Some(CategoryId::new(2)));
    }

    #[test]
    fn test_time_formats() {
        assert_eq!(
            extract("come at 2:30 pm", today()).time,
            NaiveTime::from_hms_opt(14, 30, 0)
        );
        assert_eq!(
            extract("come at 09:15", today()).time,
            NaiveTime::from_hms_opt(9, 15, 0)
        );
        assert_eq!(
            extract("come at 12am", today()).time,
            NaiveTime::from_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(extract("on 2026-08-15", today()).date, NaiveDate::from_ymd_opt(2026, 8, 15));
        assert_eq!(extract("on 15/08/2026", today()).date, NaiveDate::from_ymd_opt(2026, 8, 15));
        assert_eq!(
            extract("day after tomorrow works", today()).date,
            NaiveDate::from_ymd_opt(2026, 8, 3)
        );
    }

    #[test]
    fn test_bare_quantity() {
        assert_eq!(parse_bare_quantity("1"), Some(1));
        assert_eq!(parse_bare_quantity("two"), Some(2));
        assert_eq!(parse_bare_quantity("3 units"), Some(3));
        assert_eq!(parse_bare_quantity("no idea"), None);
    }

    #[test]
    fn test_metadata_flattening() {
        let entities = extract("AC repair tomorrow at 2pm near 560001", today());
        let map = entities.to_metadata();
        assert_eq!(map.get("pincode").and_then(|v| v.as_str()), Some("560001"));
        assert_eq!(map.get("date").and_then(|v| v.as_str()), Some("2026-08-02"));
        assert_eq!(map.get("time").and_then(|v| v.as_str()), Some("14:00"));
    }
}
