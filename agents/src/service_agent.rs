//! Service discovery agent: catalog browsing, search and recommendations.
//!
//! All results are formatted as numbered lists with structured metadata
//! alongside, so transports can render either form.

use crate::outcome::{Agent, AgentContext, AgentOutcome};
use async_trait::async_trait;
use convergeai_core::error::CoreError;
use convergeai_core::repo::CatalogRepo;
use convergeai_core::types::money::Money;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Search results cap, by ascending price.
const SEARCH_LIMIT: u32 = 20;

/// Recommendation cap, by ascending price.
const RECOMMEND_LIMIT: u32 = 5;

/// Parse "under 500" / "more than 1000" style price bounds.
fn extract_price_bounds(text: &str) -> (Option<Money>, Option<Money>) {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    let mut min_price = None;
    let mut max_price = None;
    for window in tokens.windows(2) {
        let amount = parse_amount(window[1]);
        match window[0] {
            "under" | "below" | "upto" | "max" => max_price = amount.or(max_price),
            "above" | "over" | "min" => min_price = amount.or(min_price),
            _ => {},
        }
    }
    for window in tokens.windows(3) {
        if window[1] == "than" {
            let amount = parse_amount(window[2]);
            match window[0] {
                "less" | "cheaper" => max_price = amount.or(max_price),
                "more" => min_price = amount.or(min_price),
                _ => {},
            }
        }
    }
    (min_price, max_price)
}

fn parse_amount(token: &str) -> Option<Money> {
    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok().and_then(Money::checked_from_major)
}

/// Service discovery specialist
pub struct ServiceDiscoveryAgent {
    catalog: Arc<dyn CatalogRepo>,
}

impl ServiceDiscoveryAgent {
    /// Create the agent over the catalog repository.
    #[must_use]
    pub const fn new(catalog: Arc<dyn CatalogRepo>) -> Self {
        Self { catalog }
    }

    async fn rate_card_details(
        &self,
        id: convergeai_core::types::ids::RateCardId,
    ) -> Result<AgentOutcome, CoreError> {
        let Some(card) = self.catalog.get_rate_card(id).await? else {
            return Ok(AgentOutcome::reply(
                "I couldn't find that service option. Try browsing the catalog - say \
                 \"show me services\".",
                "service_not_found",
            ));
        };
        let subcategory = self.catalog.get_subcategory(card.subcategory_id).await?;
        let (sub_name, duration) = subcategory
            .map_or(("service".to_string(), 60), |s| (s.name, s.default_duration_minutes));
        let strike = card
            .strike_price
            .map(|p| format!(" (was {p})"))
            .unwrap_or_default();
        Ok(AgentOutcome::reply(
            format!(
                "{} - {}: {}{strike}. Typical duration {} minutes. Say \"book {}\" to \
                 get started.",
                sub_name, card.name, card.price, duration, sub_name,
            ),
            "service_details",
        )
        .with_metadata("rate_card", rate_card_json(&card)))
    }

    async fn browse_subcategories(
        &self,
        category: convergeai_core::types::ids::CategoryId,
    ) -> Result<AgentOutcome, CoreError> {
        let subcategories = self.catalog.list_subcategories(category).await?;
        if subcategories.is_empty() {
            return Ok(AgentOutcome::reply(
                "There are no services under that category yet.",
                "services_listed",
            ));
        }
        let mut lines = vec!["Services in this category:".to_string()];
        let mut meta = Vec::new();
        for (i, sub) in subcategories.iter().enumerate() {
            lines.push(format!("{}. {} - {}", i + 1, sub.name, sub.description));
            meta.push(json!({"id": sub.id.value(), "name": sub.name}));
        }
        Ok(AgentOutcome::reply(lines.join("\n"), "services_listed")
            .with_metadata("subcategories", Value::from(meta)))
    }

    async fn browse_rate_cards(
        &self,
        subcategory: convergeai_core::types::ids::SubcategoryId,
    ) -> Result<AgentOutcome, CoreError> {
        let cards = self.catalog.list_rate_cards(subcategory).await?;
        if cards.is_empty() {
            return Ok(AgentOutcome::reply(
                "No options are available for that service right now.",
                "rate_cards_listed",
            ));
        }
        let mut lines = vec!["Available options:".to_string()];
        let mut meta = Vec::new();
        for (i, card) in cards.iter().enumerate() {
            lines.push(format!("{}. {} - {}", i + 1, card.name, card.price));
            meta.push(rate_card_json(card));
        }
        Ok(AgentOutcome::reply(lines.join("\n"), "rate_cards_listed")
            .with_metadata("rate_cards", Value::from(meta)))
    }

    async fn browse_categories(&self) -> Result<AgentOutcome, CoreError> {
        let categories = self.catalog.list_categories().await?;
        let mut lines = vec!["Here's what we offer:".to_string()];
        let mut meta = Vec::new();
        for (i, category) in categories.iter().enumerate() {
            lines.push(format!("{}. {} - {}", i + 1, category.name, category.description));
            meta.push(json!({"id": category.id.value(), "name": category.name}));
        }
        lines.push("Which category interests you?".to_string());
        Ok(AgentOutcome::reply(lines.join("\n"), "categories_listed")
            .with_metadata("categories", Value::from(meta)))
    }

    async fn search(&self, ctx: &AgentContext) -> Result<AgentOutcome, CoreError> {
        let (min_price, max_price) = extract_price_bounds(&ctx.utterance);
        let query = ctx
            .entities
            .query
            .clone()
            .unwrap_or_else(|| ctx.utterance.clone());
        let cards = self
            .catalog
            .search_rate_cards(
                &query,
                min_price,
                max_price,
                ctx.entities.category_id,
                SEARCH_LIMIT,
            )
            .await?;
        if cards.is_empty() {
            return Ok(AgentOutcome::reply(
                "I couldn't find services matching that. Try different words, or say \
                 \"show me services\" to browse.",
                "search_empty",
            ));
        }
        let mut lines = vec!["Here's what I found:".to_string()];
        let mut meta = Vec::new();
        for (i, card) in cards.iter().enumerate() {
            lines.push(format!("{}. {} - {}", i + 1, card.name, card.price));
            meta.push(rate_card_json(card));
        }
        Ok(AgentOutcome::reply(lines.join("\n"), "search_results")
            .with_metadata("rate_cards", Value::from(meta)))
    }

    async fn recommend(&self, ctx: &AgentContext) -> Result<AgentOutcome, CoreError> {
        let keywords: Vec<String> = ctx
            .utterance
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 4)
            .map(str::to_lowercase)
            .collect();
        let cards = self.catalog.recommend(&keywords, RECOMMEND_LIMIT).await?;
        if cards.is_empty() {
            return self.browse_categories().await;
        }
        let mut lines = vec!["You might like:".to_string()];
        let mut meta = Vec::new();
        for (i, card) in cards.iter().enumerate() {
            lines.push(format!("{}. {} - {}", i + 1, card.name, card.price));
            meta.push(rate_card_json(card));
        }
        Ok(AgentOutcome::reply(lines.join("\n"), "recommendations")
            .with_metadata("rate_cards", Value::from(meta)))
    }
}

fn rate_card_json(card: &convergeai_core::types::catalog::RateCard) -> Value {
    json!({
        "id": card.id.value(),
        "subcategory_id": card.subcategory_id.value(),
        "name": card.name,
        "price_minor": card.price.minor(),
    })
}

#[async_trait]
impl Agent for ServiceDiscoveryAgent {
    fn name(&self) -> &'static str {
        "service_discovery"
    }

    async fn execute(&self, ctx: &AgentContext) -> AgentOutcome {
        let lower = ctx.utterance.to_lowercase();
        let result = if let Some(id) = ctx.entities.rate_card_id {
            self.rate_card_details(id).await
        } else if let Some(id) = ctx.entities.subcategory_id {
            self.browse_rate_cards(id).await
        } else if let Some(id) = ctx.entities.category_id {
            self.browse_subcategories(id).await
        } else if lower.contains("recommend") || lower.contains("suggest") {
            self.recommend(ctx).await
        } else if lower.contains("categor")
            || lower.contains("what services")
            || lower.contains("browse")
        {
            self.browse_categories().await
        } else {
            self.search(ctx).await
        };

        match result {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, "service discovery failed");
                AgentOutcome::failed(error.kind(), "service_discovery_failed")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::extract_price_bounds;
    use convergeai_core::types::money::Money;

    #[test]
    fn test_price_bounds() {
        let (min, max) = extract_price_bounds("cleaning under 500");
        assert_eq!(min, None);
        assert_eq!(max, Money::checked_from_major(500));

        let (min, max) = extract_price_bounds("ac repair above 300 but less than 1000");
        assert_eq!(min, Money::checked_from_major(300));
        assert_eq!(max, Money::checked_from_major(1000));

        let (min, max) = extract_price_bounds("plain search");
        assert_eq!(min, None);
        assert_eq!(max, None);
    }
}
