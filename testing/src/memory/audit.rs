//! In-memory audit log.

use async_trait::async_trait;
use convergeai_core::error::CoreResult;
use convergeai_core::repo::AuditRepo;
use convergeai_core::types::audit::AuditEntry;
use tokio::sync::RwLock;

/// Append-only in-memory audit log
#[derive(Default)]
pub struct InMemoryAuditRepo {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditRepo {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in append order, for assertions.
    pub async fn all(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditRepo for InMemoryAuditRepo {
    async fn record(&self, entry: AuditEntry) -> CoreResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> CoreResult<Vec<AuditEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit as usize).cloned().collect())
    }
}
