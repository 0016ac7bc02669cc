//! TTL cache over the catalog repository.
//!
//! The catalog tables are read-mostly; this decorator caches the hot read
//! paths in-process with a TTL of at most five minutes and lazy
//! invalidation (stale entries are replaced on the next read after
//! expiry). Search and recommendation queries pass through uncached.

use async_trait::async_trait;
use convergeai_core::error::CoreResult;
use convergeai_core::repo::CatalogRepo;
use convergeai_core::types::catalog::{Category, Pincode, RateCard, Subcategory};
use convergeai_core::types::ids::{CategoryId, RateCardId, SubcategoryId};
use convergeai_core::types::money::Money;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Upper bound on the cache TTL.
pub const MAX_TTL: Duration = Duration::from_secs(300);

struct Entry<V> {
    stored_at: Instant,
    value: V,
}

struct KeyedCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> KeyedCache<K, V> {
    fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    async fn get(&self, key: &K, ttl: Duration) -> Option<V> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < ttl)
            .map(|e| e.value.clone())
    }

    async fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock().await;
        entries.insert(key, Entry { stored_at: Instant::now(), value });
    }
}

/// Caching decorator around any [`CatalogRepo`]
pub struct CachedCatalogRepo {
    inner: Arc<dyn CatalogRepo>,
    ttl: Duration,
    categories: KeyedCache<(), Vec<Category>>,
    subcategories: KeyedCache<CategoryId, Vec<Subcategory>>,
    subcategory_by_id: KeyedCache<SubcategoryId, Option<Subcategory>>,
    rate_cards: KeyedCache<SubcategoryId, Vec<RateCard>>,
    rate_card_by_id: KeyedCache<RateCardId, Option<RateCard>>,
    serviceable: KeyedCache<(SubcategoryId, String), bool>,
}

impl CachedCatalogRepo {
    /// Wrap a repository; `ttl` is clamped to [`MAX_TTL`].
    #[must_use]
    pub fn new(inner: Arc<dyn CatalogRepo>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl: ttl.min(MAX_TTL),
            categories: KeyedCache::new(),
            subcategories: KeyedCache::new(),
            subcategory_by_id: KeyedCache::new(),
            rate_cards: KeyedCache::new(),
            rate_card_by_id: KeyedCache::new(),
            serviceable: KeyedCache::new(),
        }
    }
}

#[async_trait]
impl CatalogRepo for CachedCatalogRepo {
    async fn list_categories(&self) -> CoreResult<Vec<Category>> {
        if let Some(hit) = self.categories.get(&(), self.ttl).await {
            return Ok(hit);
        }
        let fresh = self.inner.list_categories().await?;
        self.categories.put((), fresh.clone()).await;
        Ok(fresh)
    }

    async fn list_subcategories(&self, category: CategoryId) -> CoreResult<Vec<Subcategory>> {
        if let Some(hit) = self.subcategories.get(&category, self.ttl).await {
            return Ok(hit);
        }
        let fresh = self.inner.list_subcategories(category).await?;
        self.subcategories.put(category, fresh.clone()).await;
        Ok(fresh)
    }

    async fn get_subcategory(&self, id: SubcategoryId) -> CoreResult<Option<Subcategory>> {
        if let Some(hit) = self.subcategory_by_id.get(&id, self.ttl).await {
            return Ok(hit);
        }
        let fresh = self.inner.get_subcategory(id).await?;
        self.subcategory_by_id.put(id, fresh.clone()).await;
        Ok(fresh)
    }

    async fn find_subcategory_by_name(&self, query: &str) -> CoreResult<Option<Subcategory>> {
        self.inner.find_subcategory_by_name(query).await
    }

    async fn list_rate_cards(&self, subcategory: SubcategoryId) -> CoreResult<Vec<RateCard>> {
        if let Some(hit) = self.rate_cards.get(&subcategory, self.ttl).await {
            return Ok(hit);
        }
        let fresh = self.inner.list_rate_cards(subcategory).await?;
        self.rate_cards.put(subcategory, fresh.clone()).await;
        Ok(fresh)
    }

    async fn get_rate_card(&self, id: RateCardId) -> CoreResult<Option<RateCard>> {
        if let Some(hit) = self.rate_card_by_id.get(&id, self.ttl).await {
            return Ok(hit);
        }
        let fresh = self.inner.get_rate_card(id).await?;
        self.rate_card_by_id.put(id, fresh.clone()).await;
        Ok(fresh)
    }

    async fn search_rate_cards(
        &self,
        query: &str,
        min_price: Option<Money>,
        max_price: Option<Money>,
        category: Option<CategoryId>,
        limit: u32,
    ) -> CoreResult<Vec<RateCard>> {
        self.inner
            .search_rate_cards(query, min_price, max_price, category, limit)
            .await
    }

    async fn recommend(&self, keywords: &[String], limit: u32) -> CoreResult<Vec<RateCard>> {
        self.inner.recommend(keywords, limit).await
    }

    async fn is_serviceable(
        &self,
        subcategory: SubcategoryId,
        pincode: &Pincode,
    ) -> CoreResult<bool> {
        let key = (subcategory, pincode.as_str().to_string());
        if let Some(hit) = self.serviceable.get(&key, self.ttl).await {
            return Ok(hit);
        }
        let fresh = self.inner.is_serviceable(subcategory, pincode).await?;
        self.serviceable.put(key, fresh).await;
        Ok(fresh)
    }
}
