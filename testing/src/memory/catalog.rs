//! In-memory catalog and address repositories.

use async_trait::async_trait;
use convergeai_core::error::CoreResult;
use convergeai_core::repo::{AddressRepo, CatalogRepo};
use convergeai_core::types::catalog::{
    Address, Category, Pincode, Provider, RateCard, Subcategory,
};
use convergeai_core::types::ids::{
    AddressId, CategoryId, ProviderId, RateCardId, SubcategoryId, UserId,
};
use convergeai_core::types::money::Money;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct CatalogInner {
    categories: Vec<Category>,
    subcategories: Vec<Subcategory>,
    rate_cards: Vec<RateCard>,
    providers: HashMap<ProviderId, Provider>,
    /// Which provider serves which subcategory at which pincode.
    coverage: HashSet<(SubcategoryId, String, ProviderId)>,
}

/// RwLock-backed catalog repository with explicit seeding
#[derive(Default)]
pub struct InMemoryCatalogRepo {
    inner: RwLock<CatalogInner>,
}

impl InMemoryCatalogRepo {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a category.
    pub async fn add_category(&self, category: Category) {
        self.inner.write().await.categories.push(category);
    }

    /// Seed a subcategory.
    pub async fn add_subcategory(&self, subcategory: Subcategory) {
        self.inner.write().await.subcategories.push(subcategory);
    }

    /// Seed a rate card.
    pub async fn add_rate_card(&self, rate_card: RateCard) {
        self.inner.write().await.rate_cards.push(rate_card);
    }

    /// Seed a provider.
    pub async fn add_provider(&self, provider: Provider) {
        self.inner.write().await.providers.insert(provider.id, provider);
    }

    /// Mark a provider as serving a subcategory at a pincode.
    pub async fn add_coverage(
        &self,
        subcategory: SubcategoryId,
        pincode: &Pincode,
        provider: ProviderId,
    ) {
        self.inner
            .write()
            .await
            .coverage
            .insert((subcategory, pincode.as_str().to_string(), provider));
    }

    /// Withdraw all coverage for a subcategory at a pincode, for tests that
    /// simulate availability changing between slot fill and commit.
    pub async fn remove_coverage(&self, subcategory: SubcategoryId, pincode: &Pincode) {
        self.inner
            .write()
            .await
            .coverage
            .retain(|(s, p, _)| !(*s == subcategory && p == pincode.as_str()));
    }
}

fn matches_query(haystack: &str, query: &str) -> bool {
    let haystack = haystack.to_lowercase();
    let query = query.to_lowercase();
    haystack.contains(&query)
        || query.contains(&haystack)
        || query
            .split_whitespace()
            .any(|word| word.len() >= 3 && haystack.contains(word))
}

#[async_trait]
impl CatalogRepo for InMemoryCatalogRepo {
    async fn list_categories(&self) -> CoreResult<Vec<Category>> {
        let inner = self.inner.read().await;
        Ok(inner.categories.iter().filter(|c| c.active).cloned().collect())
    }

    async fn list_subcategories(&self, category: CategoryId) -> CoreResult<Vec<Subcategory>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subcategories
            .iter()
            .filter(|s| s.category_id == category && s.active)
            .cloned()
            .collect())
    }

    async fn get_subcategory(&self, id: SubcategoryId) -> CoreResult<Option<Subcategory>> {
        let inner = self.inner.read().await;
        Ok(inner.subcategories.iter().find(|s| s.id == id).cloned())
    }

    async fn find_subcategory_by_name(&self, query: &str) -> CoreResult<Option<Subcategory>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subcategories
            .iter()
            .filter(|s| s.active)
            .find(|s| {
                let name = s.name.to_lowercase();
                let query = query.to_lowercase();
                query.contains(&name) || name.contains(query.trim())
            })
            .cloned())
    }

    async fn list_rate_cards(&self, subcategory: SubcategoryId) -> CoreResult<Vec<RateCard>> {
        let inner = self.inner.read().await;
        let mut cards: Vec<RateCard> = inner
            .rate_cards
            .iter()
            .filter(|c| c.subcategory_id == subcategory && c.active)
            .cloned()
            .collect();
        cards.sort_by_key(|c| (c.price, c.id));
        Ok(cards)
    }

    async fn get_rate_card(&self, id: RateCardId) -> CoreResult<Option<RateCard>> {
        let inner = self.inner.read().await;
        Ok(inner.rate_cards.iter().find(|c| c.id == id).cloned())
    }

    async fn search_rate_cards(
        &self,
        query: &str,
        min_price: Option<Money>,
        max_price: Option<Money>,
        category: Option<CategoryId>,
        limit: u32,
    ) -> CoreResult<Vec<RateCard>> {
        let inner = self.inner.read().await;
        let mut cards: Vec<RateCard> = inner
            .rate_cards
            .iter()
            .filter(|c| c.active)
            .filter(|c| min_price.is_none_or(|p| c.price >= p))
            .filter(|c| max_price.is_none_or(|p| c.price <= p))
            .filter(|c| {
                let Some(sub) = inner.subcategories.iter().find(|s| s.id == c.subcategory_id)
                else {
                    return false;
                };
                if category.is_some_and(|cat| sub.category_id != cat) {
                    return false;
                }
                matches_query(&c.name, query)
                    || matches_query(&sub.name, query)
                    || matches_query(&sub.description, query)
            })
            .cloned()
            .collect();
        cards.sort_by_key(|c| (c.price, c.id));
        cards.truncate(limit as usize);
        Ok(cards)
    }

    async fn recommend(&self, keywords: &[String], limit: u32) -> CoreResult<Vec<RateCard>> {
        let inner = self.inner.read().await;
        let matching_subs: HashSet<SubcategoryId> = inner
            .subcategories
            .iter()
            .filter(|s| s.active)
            .filter(|s| {
                let haystack = format!("{} {}", s.name, s.description).to_lowercase();
                keywords.iter().any(|k| haystack.contains(&k.to_lowercase()))
            })
            .map(|s| s.id)
            .collect();
        let mut cards: Vec<RateCard> = inner
            .rate_cards
            .iter()
            .filter(|c| c.active && matching_subs.contains(&c.subcategory_id))
            .cloned()
            .collect();
        cards.sort_by_key(|c| (c.price, c.id));
        cards.truncate(limit as usize);
        Ok(cards)
    }

    async fn is_serviceable(
        &self,
        subcategory: SubcategoryId,
        pincode: &Pincode,
    ) -> CoreResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.coverage.iter().any(|(s, p, provider_id)| {
            *s == subcategory
                && p == pincode.as_str()
                && inner
                    .providers
                    .get(provider_id)
                    .is_some_and(Provider::is_serviceable)
        }))
    }
}

/// RwLock-backed address repository
#[derive(Default)]
pub struct InMemoryAddressRepo {
    addresses: RwLock<Vec<Address>>,
}

impl InMemoryAddressRepo {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an address.
    pub async fn add(&self, address: Address) {
        self.addresses.write().await.push(address);
    }
}

#[async_trait]
impl AddressRepo for InMemoryAddressRepo {
    async fn get(&self, id: AddressId) -> CoreResult<Option<Address>> {
        Ok(self.addresses.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn default_for_user(&self, user_ref: UserId) -> CoreResult<Option<Address>> {
        let addresses = self.addresses.read().await;
        let defaults: Vec<&Address> = addresses
            .iter()
            .filter(|a| a.user_ref == user_ref && a.is_default)
            .collect();
        Ok(if defaults.len() == 1 { Some(defaults[0].clone()) } else { None })
    }

    async fn list_for_user(&self, user_ref: UserId) -> CoreResult<Vec<Address>> {
        Ok(self
            .addresses
            .read()
            .await
            .iter()
            .filter(|a| a.user_ref == user_ref)
            .cloned()
            .collect())
    }
}
