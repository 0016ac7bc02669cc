//! Fixed clock for deterministic SLA and scheduling tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use convergeai_core::clock::Clock;
use std::sync::Mutex;

/// A settable clock; every reader sees the same instant until advanced.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Clock pinned at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Clock pinned at 2026-03-02 10:00:00 UTC, a Monday mid-morning.
    #[must_use]
    pub fn monday_morning() -> Self {
        Self::new(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).single().unwrap_or_default())
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += by;
    }

    /// Pin the clock to a new instant.
    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
