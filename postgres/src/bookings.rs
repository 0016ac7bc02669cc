//! PostgreSQL booking repository.
//!
//! Schema:
//!
//! ```sql
//! CREATE TABLE bookings (
//!     id                   BIGSERIAL PRIMARY KEY,
//!     order_id             TEXT NOT NULL UNIQUE,
//!     booking_number       TEXT NOT NULL UNIQUE,
//!     user_ref             BIGINT NOT NULL,
//!     address_ref          BIGINT NOT NULL,
//!     subtotal             BIGINT NOT NULL,
//!     total                BIGINT NOT NULL,
//!     status               TEXT NOT NULL,
//!     payment_status       TEXT NOT NULL,
//!     preferred_date       DATE NOT NULL,
//!     preferred_time       TIME NOT NULL,
//!     special_instructions TEXT,
//!     cancelled_at         TIMESTAMPTZ,
//!     cancellation_reason  TEXT,
//!     created_at           TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX idx_bookings_user ON bookings(user_ref, created_at DESC);
//!
//! CREATE TABLE booking_items (
//!     id                    BIGSERIAL PRIMARY KEY,
//!     booking_id            BIGINT NOT NULL REFERENCES bookings(id),
//!     rate_card_id          BIGINT NOT NULL,
//!     provider_ref          BIGINT,
//!     address_ref           BIGINT NOT NULL,
//!     service_name          TEXT NOT NULL,
//!     quantity              INT NOT NULL,
//!     unit_price            BIGINT NOT NULL,
//!     total_amount          BIGINT NOT NULL,
//!     final_amount          BIGINT NOT NULL,
//!     scheduled_date        DATE NOT NULL,
//!     scheduled_window_from TIME NOT NULL,
//!     scheduled_window_to   TIME NOT NULL,
//!     status                TEXT NOT NULL,
//!     payment_status        TEXT NOT NULL
//! );
//! CREATE INDEX idx_items_booking ON booking_items(booking_id);
//! ```

use crate::helpers::{db_err, enum_from_str, enum_to_str, from_db_u64, to_db_u64};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_core::repo::{BookingRepo, Page};
use convergeai_core::types::booking::{Booking, BookingItem, NewBooking};
use convergeai_core::types::ids::{
    AddressId, BookingId, BookingItemId, ProviderId, RateCardId, UserId,
};
use convergeai_core::types::money::Money;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PgPool`-backed booking repository
#[derive(Clone)]
pub struct PostgresBookingRepo {
    pool: PgPool,
}

impl PostgresBookingRepo {
    /// Create the repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_booking(row: &PgRow) -> CoreResult<Booking> {
    Ok(Booking {
        id: BookingId::new(from_db_u64(row.try_get("id").map_err(db_err)?)?),
        order_id: row.try_get("order_id").map_err(db_err)?,
        booking_number: row.try_get("booking_number").map_err(db_err)?,
        user_ref: UserId::new(from_db_u64(row.try_get("user_ref").map_err(db_err)?)?),
        address_ref: AddressId::new(from_db_u64(row.try_get("address_ref").map_err(db_err)?)?),
        subtotal: Money::from_minor(from_db_u64(row.try_get("subtotal").map_err(db_err)?)?),
        total: Money::from_minor(from_db_u64(row.try_get("total").map_err(db_err)?)?),
        status: enum_from_str(&row.try_get::<String, _>("status").map_err(db_err)?)?,
        payment_status: enum_from_str(
            &row.try_get::<String, _>("payment_status").map_err(db_err)?,
        )?,
        preferred_date: row.try_get("preferred_date").map_err(db_err)?,
        preferred_time: row.try_get("preferred_time").map_err(db_err)?,
        special_instructions: row.try_get("special_instructions").map_err(db_err)?,
        cancelled_at: row.try_get("cancelled_at").map_err(db_err)?,
        cancellation_reason: row.try_get("cancellation_reason").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn map_item(row: &PgRow) -> CoreResult<BookingItem> {
    let provider: Option<i64> = row.try_get("provider_ref").map_err(db_err)?;
    Ok(BookingItem {
        id: BookingItemId::new(from_db_u64(row.try_get("id").map_err(db_err)?)?),
        booking_id: BookingId::new(from_db_u64(row.try_get("booking_id").map_err(db_err)?)?),
        rate_card_id: RateCardId::new(from_db_u64(row.try_get("rate_card_id").map_err(db_err)?)?),
        provider_ref: provider.map(from_db_u64).transpose()?.map(ProviderId::new),
        address_ref: AddressId::new(from_db_u64(row.try_get("address_ref").map_err(db_err)?)?),
        service_name: row.try_get("service_name").map_err(db_err)?,
        quantity: u32::try_from(row.try_get::<i32, _>("quantity").map_err(db_err)?)
            .map_err(|_| CoreError::Invariant("negative stored quantity".to_string()))?,
        unit_price: Money::from_minor(from_db_u64(row.try_get("unit_price").map_err(db_err)?)?),
        total_amount: Money::from_minor(from_db_u64(
            row.try_get("total_amount").map_err(db_err)?,
        )?),
        final_amount: Money::from_minor(from_db_u64(
            row.try_get("final_amount").map_err(db_err)?,
        )?),
        scheduled_date: row.try_get("scheduled_date").map_err(db_err)?,
        scheduled_window_from: row.try_get("scheduled_window_from").map_err(db_err)?,
        scheduled_window_to: row.try_get("scheduled_window_to").map_err(db_err)?,
        status: enum_from_str(&row.try_get::<String, _>("status").map_err(db_err)?)?,
        payment_status: enum_from_str(
            &row.try_get::<String, _>("payment_status").map_err(db_err)?,
        )?,
    })
}

#[async_trait]
impl BookingRepo for PostgresBookingRepo {
    async fn insert_with_items(&self, booking: NewBooking) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query(
            "INSERT INTO bookings \
             (order_id, booking_number, user_ref, address_ref, subtotal, total, status, \
              payment_status, preferred_date, preferred_time, special_instructions, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', 'unpaid', $7, $8, $9, $10) \
             RETURNING *",
        )
        .bind(&booking.order_id)
        .bind(&booking.booking_number)
        .bind(to_db_u64(booking.user_ref.value())?)
        .bind(to_db_u64(booking.address_ref.value())?)
        .bind(to_db_u64(booking.subtotal.minor())?)
        .bind(to_db_u64(booking.total.minor())?)
        .bind(booking.preferred_date)
        .bind(booking.preferred_time)
        .bind(&booking.special_instructions)
        .bind(booking.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        let stored = map_booking(&row)?;

        for item in &booking.items {
            sqlx::query(
                "INSERT INTO booking_items \
                 (booking_id, rate_card_id, address_ref, service_name, quantity, unit_price, \
                  total_amount, final_amount, scheduled_date, scheduled_window_from, \
                  scheduled_window_to, status, payment_status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', 'unpaid')",
            )
            .bind(to_db_u64(stored.id.value())?)
            .bind(to_db_u64(item.rate_card_id.value())?)
            .bind(to_db_u64(item.address_ref.value())?)
            .bind(&item.service_name)
            .bind(i32::try_from(item.quantity).unwrap_or(i32::MAX))
            .bind(to_db_u64(item.unit_price.minor())?)
            .bind(to_db_u64(item.total_amount.minor())?)
            .bind(to_db_u64(item.final_amount.minor())?)
            .bind(item.scheduled_date)
            .bind(item.scheduled_window_from)
            .bind(item.scheduled_window_to)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(stored)
    }

    async fn get(&self, id: BookingId) -> CoreResult<Option<Booking>> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = $1")
            .bind(to_db_u64(id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_booking).transpose()
    }

    async fn items(&self, id: BookingId) -> CoreResult<Vec<BookingItem>> {
        let rows = sqlx::query("SELECT * FROM booking_items WHERE booking_id = $1 ORDER BY id")
            .bind(to_db_u64(id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(map_item).collect()
    }

    async fn list_for_user(&self, user_ref: UserId, page: Page) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query(
            "SELECT * FROM bookings WHERE user_ref = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
        )
        .bind(to_db_u64(user_ref.value())?)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_booking).collect()
    }

    async fn cancel(
        &self,
        id: BookingId,
        reason: String,
        at: DateTime<Utc>,
    ) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(to_db_u64(id.value())?)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some(row) = row else { return Err(CoreError::BookingNotFound(id)) };
        let booking = map_booking(&row)?;
        if !booking.status.is_cancellable() {
            return Err(CoreError::BookingNotCancellable { status: booking.status });
        }

        let row = sqlx::query(
            "UPDATE bookings SET status = 'cancelled', cancelled_at = $2, \
             cancellation_reason = $3 WHERE id = $1 RETURNING *",
        )
        .bind(to_db_u64(id.value())?)
        .bind(at)
        .bind(&reason)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        let cancelled = map_booking(&row)?;

        sqlx::query("UPDATE booking_items SET status = 'cancelled' WHERE booking_id = $1")
            .bind(to_db_u64(id.value())?)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(cancelled)
    }

    async fn count_for_user(&self, user_ref: UserId) -> CoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM bookings WHERE user_ref = $1")
            .bind(to_db_u64(user_ref.value())?)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        from_db_u64(count)
    }

    async fn list_pending(&self, page: Page) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query(
            "SELECT * FROM bookings WHERE status = 'pending' \
             ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_booking).collect()
    }
}

/// Keep the stored literals aligned with the enum's serde names.
#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use crate::helpers::enum_to_str;
    use convergeai_core::types::booking::{BookingStatus, PaymentStatus};

    #[test]
    fn test_sql_literals_match_serde_names() {
        assert_eq!(enum_to_str(&BookingStatus::Pending).expect("name"), "pending");
        assert_eq!(enum_to_str(&BookingStatus::Cancelled).expect("name"), "cancelled");
        assert_eq!(enum_to_str(&PaymentStatus::Unpaid).expect("name"), "unpaid");
    }
}
