//! PostgreSQL catalog and address repositories.
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE categories (
//!     id          BIGSERIAL PRIMARY KEY,
//!     name        TEXT NOT NULL,
//!     description TEXT NOT NULL,
//!     active      BOOLEAN NOT NULL
//! );
//! CREATE TABLE subcategories (
//!     id                       BIGSERIAL PRIMARY KEY,
//!     category_id              BIGINT NOT NULL REFERENCES categories(id),
//!     name                     TEXT NOT NULL,
//!     description              TEXT NOT NULL,
//!     default_duration_minutes INT NOT NULL,
//!     active                   BOOLEAN NOT NULL
//! );
//! CREATE TABLE rate_cards (
//!     id             BIGSERIAL PRIMARY KEY,
//!     subcategory_id BIGINT NOT NULL REFERENCES subcategories(id),
//!     provider_id    BIGINT,
//!     name           TEXT NOT NULL,
//!     price          BIGINT NOT NULL,
//!     strike_price   BIGINT,
//!     active         BOOLEAN NOT NULL
//! );
//! CREATE TABLE providers (
//!     id       BIGSERIAL PRIMARY KEY,
//!     name     TEXT NOT NULL,
//!     active   BOOLEAN NOT NULL,
//!     verified BOOLEAN NOT NULL
//! );
//! CREATE TABLE provider_coverage (
//!     provider_id    BIGINT NOT NULL REFERENCES providers(id),
//!     subcategory_id BIGINT NOT NULL REFERENCES subcategories(id),
//!     pincode        TEXT NOT NULL,
//!     PRIMARY KEY (provider_id, subcategory_id, pincode)
//! );
//! CREATE TABLE addresses (
//!     id         BIGSERIAL PRIMARY KEY,
//!     user_ref   BIGINT NOT NULL,
//!     label      TEXT NOT NULL,
//!     line1      TEXT NOT NULL,
//!     city       TEXT NOT NULL,
//!     pincode    TEXT NOT NULL,
//!     is_default BOOLEAN NOT NULL
//! );
//! ```

use crate::helpers::{db_err, from_db_u64, to_db_u64};
use async_trait::async_trait;
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_core::repo::{AddressRepo, CatalogRepo};
use convergeai_core::types::catalog::{Address, Category, Pincode, RateCard, Subcategory};
use convergeai_core::types::ids::{
    AddressId, CategoryId, ProviderId, RateCardId, SubcategoryId, UserId,
};
use convergeai_core::types::money::Money;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PgPool`-backed catalog repository
#[derive(Clone)]
pub struct PostgresCatalogRepo {
    pool: PgPool,
}

impl PostgresCatalogRepo {
    /// Create the repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_category(row: &PgRow) -> CoreResult<Category> {
    Ok(Category {
        id: CategoryId::new(from_db_u64(row.try_get("id").map_err(db_err)?)?),
        name: row.try_get("name").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        active: row.try_get("active").map_err(db_err)?,
    })
}

fn map_subcategory(row: &PgRow) -> CoreResult<Subcategory> {
    Ok(Subcategory {
        id: SubcategoryId::new(from_db_u64(row.try_get("id").map_err(db_err)?)?),
        category_id: CategoryId::new(from_db_u64(row.try_get("category_id").map_err(db_err)?)?),
        name: row.try_get("name").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        default_duration_minutes: u32::try_from(
            row.try_get::<i32, _>("default_duration_minutes").map_err(db_err)?,
        )
        .map_err(|_| CoreError::Invariant("negative stored duration".to_string()))?,
        active: row.try_get("active").map_err(db_err)?,
    })
}

fn map_rate_card(row: &PgRow) -> CoreResult<RateCard> {
    let provider: Option<i64> = row.try_get("provider_id").map_err(db_err)?;
    let strike: Option<i64> = row.try_get("strike_price").map_err(db_err)?;
    Ok(RateCard {
        id: RateCardId::new(from_db_u64(row.try_get("id").map_err(db_err)?)?),
        subcategory_id: SubcategoryId::new(from_db_u64(
            row.try_get("subcategory_id").map_err(db_err)?,
        )?),
        provider_id: provider.map(from_db_u64).transpose()?.map(ProviderId::new),
        name: row.try_get("name").map_err(db_err)?,
        price: Money::from_minor(from_db_u64(row.try_get("price").map_err(db_err)?)?),
        strike_price: strike.map(from_db_u64).transpose()?.map(Money::from_minor),
        active: row.try_get("active").map_err(db_err)?,
    })
}

fn map_address(row: &PgRow) -> CoreResult<Address> {
    Ok(Address {
        id: AddressId::new(from_db_u64(row.try_get("id").map_err(db_err)?)?),
        user_ref: UserId::new(from_db_u64(row.try_get("user_ref").map_err(db_err)?)?),
        label: row.try_get("label").map_err(db_err)?,
        line1: row.try_get("line1").map_err(db_err)?,
        city: row.try_get("city").map_err(db_err)?,
        pincode: Pincode::parse(row.try_get::<String, _>("pincode").map_err(db_err)?)
            .map_err(|raw| CoreError::Invariant(format!("stored pincode invalid: {raw}")))?,
        is_default: row.try_get("is_default").map_err(db_err)?,
    })
}

#[async_trait]
impl CatalogRepo for PostgresCatalogRepo {
    async fn list_categories(&self) -> CoreResult<Vec<Category>> {
        let rows = sqlx::query("SELECT * FROM categories WHERE active ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(map_category).collect()
    }

    async fn list_subcategories(&self, category: CategoryId) -> CoreResult<Vec<Subcategory>> {
        let rows = sqlx::query(
            "SELECT * FROM subcategories WHERE category_id = $1 AND active ORDER BY id",
        )
        .bind(to_db_u64(category.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_subcategory).collect()
    }

    async fn get_subcategory(&self, id: SubcategoryId) -> CoreResult<Option<Subcategory>> {
        let row = sqlx::query("SELECT * FROM subcategories WHERE id = $1")
            .bind(to_db_u64(id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_subcategory).transpose()
    }

    async fn find_subcategory_by_name(&self, query: &str) -> CoreResult<Option<Subcategory>> {
        // Match in both directions: the utterance may contain the name, or
        // name the service more loosely.
        let row = sqlx::query(
            "SELECT * FROM subcategories \
             WHERE active AND ($1 ILIKE '%' || name || '%' OR name ILIKE '%' || $1 || '%') \
             ORDER BY length(name) DESC LIMIT 1",
        )
        .bind(query)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_subcategory).transpose()
    }

    async fn list_rate_cards(&self, subcategory: SubcategoryId) -> CoreResult<Vec<RateCard>> {
        let rows = sqlx::query(
            "SELECT * FROM rate_cards WHERE subcategory_id = $1 AND active \
             ORDER BY price ASC, id ASC",
        )
        .bind(to_db_u64(subcategory.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_rate_card).collect()
    }

    async fn get_rate_card(&self, id: RateCardId) -> CoreResult<Option<RateCard>> {
        let row = sqlx::query("SELECT * FROM rate_cards WHERE id = $1")
            .bind(to_db_u64(id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_rate_card).transpose()
    }

    async fn search_rate_cards(
        &self,
        query: &str,
        min_price: Option<Money>,
        max_price: Option<Money>,
        category: Option<CategoryId>,
        limit: u32,
    ) -> CoreResult<Vec<RateCard>> {
        let min_price = min_price.map(|p| to_db_u64(p.minor())).transpose()?;
        let max_price = max_price.map(|p| to_db_u64(p.minor())).transpose()?;
        let category = category.map(|c| to_db_u64(c.value())).transpose()?;
        let rows = sqlx::query(
            "SELECT rc.* FROM rate_cards rc \
             JOIN subcategories sc ON sc.id = rc.subcategory_id \
             WHERE rc.active AND sc.active \
               AND ($2::BIGINT IS NULL OR rc.price >= $2) \
               AND ($3::BIGINT IS NULL OR rc.price <= $3) \
               AND ($4::BIGINT IS NULL OR sc.category_id = $4) \
               AND (rc.name ILIKE '%' || $1 || '%' \
                    OR sc.name ILIKE '%' || $1 || '%' \
                    OR sc.description ILIKE '%' || $1 || '%' \
                    OR $1 ILIKE '%' || sc.name || '%') \
             ORDER BY rc.price ASC, rc.id ASC LIMIT $5",
        )
        .bind(query)
        .bind(min_price)
        .bind(max_price)
        .bind(category)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_rate_card).collect()
    }

    async fn recommend(&self, keywords: &[String], limit: u32) -> CoreResult<Vec<RateCard>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT rc.* FROM rate_cards rc \
             JOIN subcategories sc ON sc.id = rc.subcategory_id \
             WHERE rc.active AND sc.active \
               AND EXISTS ( \
                   SELECT 1 FROM unnest($1::TEXT[]) AS kw \
                   WHERE sc.name ILIKE '%' || kw || '%' \
                      OR sc.description ILIKE '%' || kw || '%') \
             ORDER BY rc.price ASC, rc.id ASC LIMIT $2",
        )
        .bind(keywords)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_rate_card).collect()
    }

    async fn is_serviceable(
        &self,
        subcategory: SubcategoryId,
        pincode: &Pincode,
    ) -> CoreResult<bool> {
        let found: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM provider_coverage pc \
             JOIN providers p ON p.id = pc.provider_id \
             WHERE pc.subcategory_id = $1 AND pc.pincode = $2 \
               AND p.active AND p.verified \
             LIMIT 1",
        )
        .bind(to_db_u64(subcategory.value())?)
        .bind(pincode.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(found.is_some())
    }
}

/// `PgPool`-backed address repository
#[derive(Clone)]
pub struct PostgresAddressRepo {
    pool: PgPool,
}

impl PostgresAddressRepo {
    /// Create the repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressRepo for PostgresAddressRepo {
    async fn get(&self, id: AddressId) -> CoreResult<Option<Address>> {
        let row = sqlx::query("SELECT * FROM addresses WHERE id = $1")
            .bind(to_db_u64(id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_address).transpose()
    }

    async fn default_for_user(&self, user_ref: UserId) -> CoreResult<Option<Address>> {
        let rows = sqlx::query("SELECT * FROM addresses WHERE user_ref = $1 AND is_default")
            .bind(to_db_u64(user_ref.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        if rows.len() == 1 {
            map_address(&rows[0]).map(Some)
        } else {
            Ok(None)
        }
    }

    async fn list_for_user(&self, user_ref: UserId) -> CoreResult<Vec<Address>> {
        let rows = sqlx::query("SELECT * FROM addresses WHERE user_ref = $1 ORDER BY id")
            .bind(to_db_u64(user_ref.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(map_address).collect()
    }
}
