//! Standard catalog and address fixture.
//!
//! One fixture shared across the crates' integration tests: an appliance
//! category with AC Repair (Standard/Premium), a cleaning category, and a
//! plumbing category; one verified provider covering AC Repair and
//! plumbing at 560001; user 1 with a default "home" address at 560001 and
//! an "office" address at 110001 (no coverage).

use crate::memory::{InMemoryAddressRepo, InMemoryCatalogRepo};
use convergeai_core::types::catalog::{
    Address, Category, Pincode, Provider, RateCard, Subcategory,
};
use convergeai_core::types::ids::{
    AddressId, CategoryId, ProviderId, RateCardId, SubcategoryId, UserId,
};
use convergeai_core::types::money::Money;
use std::sync::Arc;

/// Ids of the seeded rows
#[derive(Clone, Debug)]
pub struct CatalogFixture {
    /// Appliance repair category
    pub appliances: CategoryId,
    /// Cleaning category
    pub cleaning: CategoryId,
    /// AC Repair subcategory (120-minute default duration)
    pub ac_repair: SubcategoryId,
    /// Bathroom Cleaning subcategory
    pub bathroom_cleaning: SubcategoryId,
    /// Tap Repair subcategory
    pub tap_repair: SubcategoryId,
    /// AC Repair - Standard, 499.00
    pub ac_standard: RateCardId,
    /// AC Repair - Premium, 799.00
    pub ac_premium: RateCardId,
    /// Verified provider covering 560001
    pub provider: ProviderId,
    /// Serviced pincode
    pub serviced_pincode: Pincode,
    /// Pincode with no coverage
    pub unserviced_pincode: Pincode,
    /// Test user
    pub user: UserId,
    /// User's default home address (serviced pincode)
    pub home_address: AddressId,
    /// User's office address (unserviced pincode)
    pub office_address: AddressId,
}

/// Seed the standard fixture into fresh repositories.
#[allow(clippy::too_many_lines)]
#[allow(clippy::expect_used)] // Fixture literals are known-valid
pub async fn standard_catalog() -> (Arc<InMemoryCatalogRepo>, Arc<InMemoryAddressRepo>, CatalogFixture)
{
    let catalog = Arc::new(InMemoryCatalogRepo::new());
    let addresses = Arc::new(InMemoryAddressRepo::new());

    let fixture = CatalogFixture {
        appliances: CategoryId::new(1),
        cleaning: CategoryId::new(2),
        ac_repair: SubcategoryId::new(10),
        bathroom_cleaning: SubcategoryId::new(11),
        tap_repair: SubcategoryId::new(12),
        ac_standard: RateCardId::new(100),
        ac_premium: RateCardId::new(101),
        provider: ProviderId::new(500),
        serviced_pincode: Pincode::parse("560001").expect("valid fixture pincode"),
        unserviced_pincode: Pincode::parse("110001").expect("valid fixture pincode"),
        user: UserId::new(1),
        home_address: AddressId::new(700),
        office_address: AddressId::new(701),
    };

    catalog
        .add_category(Category {
            id: fixture.appliances,
            name: "Appliance Repair".to_string(),
            description: "Repair and maintenance for home appliances".to_string(),
            active: true,
        })
        .await;
    catalog
        .add_category(Category {
            id: fixture.cleaning,
            name: "Cleaning".to_string(),
            description: "Home and bathroom deep cleaning".to_string(),
            active: true,
        })
        .await;

    catalog
        .add_subcategory(Subcategory {
            id: fixture.ac_repair,
            category_id: fixture.appliances,
            name: "AC Repair".to_string(),
            description: "Split and window AC diagnosis and repair".to_string(),
            default_duration_minutes: 120,
            active: true,
        })
        .await;
    catalog
        .add_subcategory(Subcategory {
            id: fixture.bathroom_cleaning,
            category_id: fixture.cleaning,
            name: "Bathroom Cleaning".to_string(),
            description: "Deep cleaning for bathrooms and fittings".to_string(),
            default_duration_minutes: 90,
            active: true,
        })
        .await;
    catalog
        .add_subcategory(Subcategory {
            id: fixture.tap_repair,
            category_id: fixture.appliances,
            name: "Tap Repair".to_string(),
            description: "Leaking tap and faucet plumbing fixes".to_string(),
            default_duration_minutes: 45,
            active: true,
        })
        .await;

    catalog
        .add_rate_card(RateCard {
            id: fixture.ac_standard,
            subcategory_id: fixture.ac_repair,
            provider_id: None,
            name: "Standard".to_string(),
            price: Money::from_minor(49_900),
            strike_price: Some(Money::from_minor(59_900)),
            active: true,
        })
        .await;
    catalog
        .add_rate_card(RateCard {
            id: fixture.ac_premium,
            subcategory_id: fixture.ac_repair,
            provider_id: None,
            name: "Premium".to_string(),
            price: Money::from_minor(79_900),
            strike_price: None,
            active: true,
        })
        .await;
    catalog
        .add_rate_card(RateCard {
            id: RateCardId::new(102),
            subcategory_id: fixture.bathroom_cleaning,
            provider_id: None,
            name: "Classic".to_string(),
            price: Money::from_minor(39_900),
            strike_price: None,
            active: true,
        })
        .await;
    catalog
        .add_rate_card(RateCard {
            id: RateCardId::new(103),
            subcategory_id: fixture.tap_repair,
            provider_id: None,
            name: "Single Tap".to_string(),
            price: Money::from_minor(19_900),
            strike_price: None,
            active: true,
        })
        .await;

    catalog
        .add_provider(Provider {
            id: fixture.provider,
            name: "CoolFix Services".to_string(),
            active: true,
            verified: true,
        })
        .await;
    catalog
        .add_coverage(fixture.ac_repair, &fixture.serviced_pincode, fixture.provider)
        .await;
    catalog
        .add_coverage(fixture.tap_repair, &fixture.serviced_pincode, fixture.provider)
        .await;
    catalog
        .add_coverage(
            fixture.bathroom_cleaning,
            &fixture.serviced_pincode,
            fixture.provider,
        )
        .await;

    addresses
        .add(Address {
            id: fixture.home_address,
            user_ref: fixture.user,
            label: "home".to_string(),
            line1: "12 Residency Road".to_string(),
            city: "Bengaluru".to_string(),
            pincode: fixture.serviced_pincode.clone(),
            is_default: true,
        })
        .await;
    addresses
        .add(Address {
            id: fixture.office_address,
            user_ref: fixture.user,
            label: "office".to_string(),
            line1: "8 Connaught Place".to_string(),
            city: "New Delhi".to_string(),
            pincode: fixture.unserviced_pincode.clone(),
            is_default: false,
        })
        .await;

    (catalog, addresses, fixture)
}
