//! In-memory complaint repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_core::repo::{ComplaintRepo, Page};
use convergeai_core::types::complaint::{
    Complaint, ComplaintFilter, ComplaintStatus, ComplaintUpdate, NewComplaint,
};
use convergeai_core::types::ids::{ComplaintId, StaffId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    complaints: HashMap<ComplaintId, Complaint>,
    updates: HashMap<ComplaintId, Vec<ComplaintUpdate>>,
}

/// RwLock-backed complaint repository
#[derive(Default)]
pub struct InMemoryComplaintRepo {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
}

impl InMemoryComplaintRepo {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a complaint directly, returning its id.
    pub async fn seed(&self, complaint: NewComplaint) -> CoreResult<Complaint> {
        self.insert(complaint).await
    }

    /// Assign a complaint to a staff member, for alert-routing tests.
    pub async fn assign(&self, id: ComplaintId, staff: StaffId) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let complaint = inner
            .complaints
            .get_mut(&id)
            .ok_or(CoreError::ComplaintNotFound(id))?;
        complaint.assigned_staff = Some(staff);
        Ok(())
    }
}

#[async_trait]
impl ComplaintRepo for InMemoryComplaintRepo {
    async fn insert(&self, complaint: NewComplaint) -> CoreResult<Complaint> {
        let mut inner = self.inner.write().await;
        let id = ComplaintId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = Complaint {
            id,
            user_ref: complaint.user_ref,
            booking_ref: complaint.booking_ref,
            session_ref: complaint.session_ref,
            complaint_type: complaint.complaint_type,
            subject: complaint.subject,
            description: complaint.description,
            priority: complaint.priority,
            status: ComplaintStatus::Open,
            assigned_staff: None,
            resolution: None,
            sentiment: complaint.sentiment,
            response_due_at: complaint.response_due_at,
            resolution_due_at: complaint.resolution_due_at,
            created_at: complaint.created_at,
        };
        inner.updates.insert(id, Vec::new());
        inner.complaints.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: ComplaintId) -> CoreResult<Option<Complaint>> {
        Ok(self.inner.read().await.complaints.get(&id).cloned())
    }

    async fn list(&self, filter: ComplaintFilter, page: Page) -> CoreResult<Vec<Complaint>> {
        let inner = self.inner.read().await;
        let mut complaints: Vec<Complaint> = inner
            .complaints
            .values()
            .filter(|c| filter.status.is_none_or(|s| c.status == s))
            .filter(|c| filter.priority.is_none_or(|p| c.priority == p))
            .filter(|c| filter.assigned.is_none_or(|a| c.assigned_staff.is_some() == a))
            .cloned()
            .collect();
        complaints.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(complaints
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn set_status(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        actor: Option<StaffId>,
        note: Option<String>,
        resolution: Option<String>,
        at: DateTime<Utc>,
    ) -> CoreResult<Complaint> {
        let mut inner = self.inner.write().await;
        let complaint = inner
            .complaints
            .get_mut(&id)
            .ok_or(CoreError::ComplaintNotFound(id))?;
        let old_status = complaint.status;
        complaint.status = status;
        if resolution.is_some() {
            complaint.resolution = resolution;
        }
        let complaint = complaint.clone();
        inner.updates.entry(id).or_default().push(ComplaintUpdate {
            complaint_id: id,
            actor,
            old_status,
            new_status: status,
            note,
            created_at: at,
        });
        Ok(complaint)
    }

    async fn updates(&self, id: ComplaintId) -> CoreResult<Vec<ComplaintUpdate>> {
        Ok(self.inner.read().await.updates.get(&id).cloned().unwrap_or_default())
    }

    async fn list_open_for_sla(&self) -> CoreResult<Vec<Complaint>> {
        let inner = self.inner.read().await;
        let mut complaints: Vec<Complaint> = inner
            .complaints
            .values()
            .filter(|c| c.status.is_sla_tracked())
            .cloned()
            .collect();
        complaints.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(complaints)
    }

    async fn list_created_since(&self, since: DateTime<Utc>) -> CoreResult<Vec<Complaint>> {
        let inner = self.inner.read().await;
        let mut complaints: Vec<Complaint> = inner
            .complaints
            .values()
            .filter(|c| c.created_at >= since)
            .cloned()
            .collect();
        complaints.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(complaints)
    }
}
