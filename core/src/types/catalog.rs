//! Service catalog: categories, subcategories, rate cards, providers,
//! addresses.
//!
//! A rate card is bookable at a pincode iff at least one provider serving
//! that pincode for the rate card's subcategory is both active and verified.
//! Serviceability queries live on the catalog repository; these types only
//! carry the flags.

use super::ids::{AddressId, CategoryId, ProviderId, RateCardId, SubcategoryId, UserId};
use super::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A six-digit postal pincode.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pincode(String);

impl Pincode {
    /// Parse a pincode; must be exactly six digits, not starting with zero.
    ///
    /// # Errors
    ///
    /// Returns the rejected string back to the caller.
    pub fn parse(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        let ok = value.len() == 6
            && value.chars().all(|c| c.is_ascii_digit())
            && !value.starts_with('0');
        if ok { Ok(Self(value)) } else { Err(value) }
    }

    /// Borrow the digits
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Top-level service category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Category id
    pub id: CategoryId,
    /// Display name
    pub name: String,
    /// Short description
    pub description: String,
    /// Whether the category is browsable
    pub active: bool,
}

/// Service subcategory under a category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    /// Subcategory id
    pub id: SubcategoryId,
    /// Parent category
    pub category_id: CategoryId,
    /// Display name
    pub name: String,
    /// Short description
    pub description: String,
    /// Default service duration in minutes; scheduled windows derive from it
    pub default_duration_minutes: u32,
    /// Whether the subcategory is browsable
    pub active: bool,
}

/// A priced variant of a subcategory (e.g. "AC Repair - Premium")
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    /// Rate card id
    pub id: RateCardId,
    /// Subcategory this rate card prices
    pub subcategory_id: SubcategoryId,
    /// Dedicated provider, if the card is provider-specific
    pub provider_id: Option<ProviderId>,
    /// Display name
    pub name: String,
    /// Current price per unit
    pub price: Money,
    /// Struck-through list price, if discounted
    pub strike_price: Option<Money>,
    /// Whether the card is bookable
    pub active: bool,
}

/// A service provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    /// Provider id
    pub id: ProviderId,
    /// Display name
    pub name: String,
    /// Whether the provider is accepting work
    pub active: bool,
    /// Whether onboarding verification completed
    pub verified: bool,
}

impl Provider {
    /// Providers count toward serviceability only when active and verified.
    #[must_use]
    pub const fn is_serviceable(&self) -> bool {
        self.active && self.verified
    }
}

/// A user's saved address (reads only; CRUD is external)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// Address id
    pub id: AddressId,
    /// Owning user
    pub user_ref: UserId,
    /// Label such as "home" or "office"
    pub label: String,
    /// Street line
    pub line1: String,
    /// City
    pub city: String,
    /// Postal pincode
    pub pincode: Pincode,
    /// Whether this is the user's default address
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pincode_parse() {
        assert!(Pincode::parse("560001").is_ok());
        assert!(Pincode::parse("056001").is_err());
        assert!(Pincode::parse("56001").is_err());
        assert!(Pincode::parse("5600011").is_err());
        assert!(Pincode::parse("56000a").is_err());
    }

    #[test]
    fn test_provider_serviceability_needs_both_flags() {
        let mut provider = Provider {
            id: ProviderId::new(1),
            name: "CoolFix".to_string(),
            active: true,
            verified: false,
        };
        assert!(!provider.is_serviceable());
        provider.verified = true;
        assert!(provider.is_serviceable());
        provider.active = false;
        assert!(!provider.is_serviceable());
    }
}
