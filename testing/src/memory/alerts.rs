//! In-memory alert repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_core::repo::{AlertRepo, Page};
use convergeai_core::types::alert::{Alert, AlertFilter, AlertKind, NewAlert, ResourceRef};
use convergeai_core::types::ids::{AlertId, StaffId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// RwLock-backed alert repository
#[derive(Default)]
pub struct InMemoryAlertRepo {
    alerts: RwLock<HashMap<AlertId, Alert>>,
    next_id: AtomicU64,
}

impl InMemoryAlertRepo {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored alert, unfiltered, for assertions.
    pub async fn all(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.alerts.read().await.values().cloned().collect();
        alerts.sort_by_key(|a| a.id);
        alerts
    }
}

fn visible_to(alert: &Alert, staff: Option<StaffId>) -> bool {
    match staff {
        // Broadcast rows are visible to every staff member.
        Some(staff) => alert.staff_ref.is_none() || alert.staff_ref == Some(staff),
        None => true,
    }
}

#[async_trait]
impl AlertRepo for InMemoryAlertRepo {
    async fn insert(&self, alert: NewAlert) -> CoreResult<Alert> {
        let mut alerts = self.alerts.write().await;
        let id = AlertId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = Alert {
            id,
            kind: alert.kind,
            severity: alert.severity,
            title: alert.title,
            message: alert.message,
            resource: alert.resource,
            staff_ref: alert.staff_ref,
            is_read: false,
            is_dismissed: false,
            metadata: alert.metadata,
            created_at: alert.created_at,
            read_at: None,
            dismissed_at: None,
            expires_at: alert.expires_at,
        };
        alerts.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_recent(
        &self,
        kind: AlertKind,
        resource: &ResourceRef,
        since: DateTime<Utc>,
    ) -> CoreResult<Option<Alert>> {
        let alerts = self.alerts.read().await;
        Ok(alerts
            .values()
            .filter(|a| a.kind == kind && &a.resource == resource && a.created_at >= since)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn list(
        &self,
        filter: AlertFilter,
        page: Page,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<Alert>> {
        let alerts = self.alerts.read().await;
        let mut rows: Vec<Alert> = alerts
            .values()
            .filter(|a| !a.is_expired(now))
            .filter(|a| visible_to(a, filter.staff))
            .filter(|a| filter.kind.is_none_or(|k| a.kind == k))
            .filter(|a| filter.severity.is_none_or(|s| a.severity == s))
            .filter(|a| !filter.unread_only || !a.is_read)
            .filter(|a| filter.include_dismissed || !a.is_dismissed)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn mark_read(
        &self,
        id: AlertId,
        _staff: StaffId,
        at: DateTime<Utc>,
    ) -> CoreResult<Alert> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts.get_mut(&id).ok_or(CoreError::AlertNotFound(id))?;
        alert.is_read = true;
        alert.read_at = Some(at);
        Ok(alert.clone())
    }

    async fn dismiss(
        &self,
        id: AlertId,
        _staff: StaffId,
        at: DateTime<Utc>,
    ) -> CoreResult<Alert> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts.get_mut(&id).ok_or(CoreError::AlertNotFound(id))?;
        alert.is_dismissed = true;
        alert.dismissed_at = Some(at);
        Ok(alert.clone())
    }

    async fn unread_count(&self, staff: StaffId, now: DateTime<Utc>) -> CoreResult<u64> {
        let alerts = self.alerts.read().await;
        Ok(alerts
            .values()
            .filter(|a| !a.is_expired(now))
            .filter(|a| visible_to(a, Some(staff)))
            .filter(|a| !a.is_read && !a.is_dismissed)
            .count() as u64)
    }
}
