//! In-memory booking repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_core::repo::{BookingRepo, Page};
use convergeai_core::types::booking::{Booking, BookingItem, BookingStatus, NewBooking, PaymentStatus};
use convergeai_core::types::ids::{BookingId, BookingItemId, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    bookings: HashMap<BookingId, Booking>,
    items: HashMap<BookingId, Vec<BookingItem>>,
}

/// RwLock-backed booking repository
#[derive(Default)]
pub struct InMemoryBookingRepo {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
}

impl InMemoryBookingRepo {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bookings, for assertions.
    pub async fn booking_count(&self) -> usize {
        self.inner.read().await.bookings.len()
    }

    /// Seed a booking directly, for tests that need existing history.
    pub async fn seed(&self, booking: Booking, items: Vec<BookingItem>) {
        let mut inner = self.inner.write().await;
        inner.items.insert(booking.id, items);
        inner.bookings.insert(booking.id, booking);
    }
}

#[async_trait]
impl BookingRepo for InMemoryBookingRepo {
    async fn insert_with_items(&self, booking: NewBooking) -> CoreResult<Booking> {
        let mut inner = self.inner.write().await;
        let duplicate = inner.bookings.values().any(|b| {
            b.order_id == booking.order_id || b.booking_number == booking.booking_number
        });
        if duplicate {
            return Err(CoreError::DatabaseTransient(
                "unique violation on booking tokens".to_string(),
            ));
        }

        let id = BookingId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = Booking {
            id,
            order_id: booking.order_id,
            booking_number: booking.booking_number,
            user_ref: booking.user_ref,
            address_ref: booking.address_ref,
            subtotal: booking.subtotal,
            total: booking.total,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            preferred_date: booking.preferred_date,
            preferred_time: booking.preferred_time,
            special_instructions: booking.special_instructions,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: booking.created_at,
        };
        let items: Vec<BookingItem> = booking
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| BookingItem {
                id: BookingItemId::new(id.value() * 1000 + i as u64 + 1),
                booking_id: id,
                rate_card_id: item.rate_card_id,
                provider_ref: None,
                address_ref: item.address_ref,
                service_name: item.service_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_amount: item.total_amount,
                final_amount: item.final_amount,
                scheduled_date: item.scheduled_date,
                scheduled_window_from: item.scheduled_window_from,
                scheduled_window_to: item.scheduled_window_to,
                status: BookingStatus::Pending,
                payment_status: PaymentStatus::Unpaid,
            })
            .collect();
        inner.items.insert(id, items);
        inner.bookings.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: BookingId) -> CoreResult<Option<Booking>> {
        Ok(self.inner.read().await.bookings.get(&id).cloned())
    }

    async fn items(&self, id: BookingId) -> CoreResult<Vec<BookingItem>> {
        Ok(self.inner.read().await.items.get(&id).cloned().unwrap_or_default())
    }

    async fn list_for_user(&self, user_ref: UserId, page: Page) -> CoreResult<Vec<Booking>> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.user_ref == user_ref)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bookings
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn cancel(
        &self,
        id: BookingId,
        reason: String,
        at: DateTime<Utc>,
    ) -> CoreResult<Booking> {
        let mut inner = self.inner.write().await;
        let booking = inner
            .bookings
            .get_mut(&id)
            .ok_or(CoreError::BookingNotFound(id))?;
        if !booking.status.is_cancellable() {
            return Err(CoreError::BookingNotCancellable { status: booking.status });
        }
        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(at);
        booking.cancellation_reason = Some(reason);
        let booking = booking.clone();
        if let Some(items) = inner.items.get_mut(&id) {
            for item in items {
                item.status = BookingStatus::Cancelled;
            }
        }
        Ok(booking)
    }

    async fn count_for_user(&self, user_ref: UserId) -> CoreResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.bookings.values().filter(|b| b.user_ref == user_ref).count() as u64)
    }

    async fn list_pending(&self, page: Page) -> CoreResult<Vec<Booking>> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(bookings
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }
}
