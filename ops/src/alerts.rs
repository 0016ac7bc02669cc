//! Alert engine: SLA and critical-complaint scanners plus the foreground
//! alert API.
//!
//! Scanners are bounded queries followed by per-row work; a failure on one
//! complaint is logged and the scan continues. Every alert write and every
//! user-visible list read lands in the ops audit log. Dedup key:
//! `(kind, resource.kind, resource.id)` within the configured window
//! (default 24 h).

use chrono::{DateTime, Utc};
use convergeai_core::clock::Clock;
use convergeai_core::config::{AlertRules, SharedConfig};
use convergeai_core::error::CoreResult;
use convergeai_core::repo::{AlertRepo, AuditRepo, ComplaintRepo, Page};
use convergeai_core::types::alert::{
    Alert, AlertFilter, AlertKind, AlertSeverity, NewAlert, ResourceKind, ResourceRef,
};
use convergeai_core::types::audit::AuditEntry;
use convergeai_core::types::complaint::{Complaint, ComplaintPriority};
use convergeai_core::types::ids::{AlertId, StaffId};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

/// Outcome counters for one scanner pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Rows examined
    pub scanned: usize,
    /// Alerts created
    pub created: usize,
    /// Creations suppressed by the dedup rule
    pub deduplicated: usize,
    /// Rows that errored (scan continued)
    pub errors: usize,
}

/// SLA and critical-complaint alerting over the complaint store
pub struct AlertEngine {
    complaints: Arc<dyn ComplaintRepo>,
    alerts: Arc<dyn AlertRepo>,
    audit: Arc<dyn AuditRepo>,
    clock: Arc<dyn Clock>,
    config: SharedConfig,
    rules: AlertRules,
    last_critical_scan: Mutex<Option<DateTime<Utc>>>,
}

impl AlertEngine {
    /// Create the engine.
    #[must_use]
    pub fn new(
        complaints: Arc<dyn ComplaintRepo>,
        alerts: Arc<dyn AlertRepo>,
        audit: Arc<dyn AuditRepo>,
        clock: Arc<dyn Clock>,
        config: SharedConfig,
        rules: AlertRules,
    ) -> Self {
        Self {
            complaints,
            alerts,
            audit,
            clock,
            config,
            rules,
            last_critical_scan: Mutex::new(None),
        }
    }

    /// Engine rules, for scheduler wiring.
    #[must_use]
    pub const fn rules(&self) -> &AlertRules {
        &self.rules
    }

    /// One SLA scanner pass over every SLA-tracked complaint.
    #[instrument(skip_all)]
    pub async fn run_sla_scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        let complaints = match self.complaints.list_open_for_sla().await {
            Ok(complaints) => complaints,
            Err(err) => {
                error!(%err, "sla scan could not list complaints");
                report.errors += 1;
                return report;
            },
        };
        let buffer = self.config.read().await.sla_buffer();

        for complaint in &complaints {
            report.scanned += 1;
            match self.scan_one(complaint, buffer).await {
                Ok((created, deduplicated)) => {
                    report.created += created;
                    report.deduplicated += deduplicated;
                },
                Err(err) => {
                    // One bad row must not halt the scan.
                    error!(complaint = %complaint.id, %err, "sla scan row failed");
                    report.errors += 1;
                },
            }
        }
        info!(
            scanned = report.scanned,
            created = report.created,
            deduplicated = report.deduplicated,
            errors = report.errors,
            "sla scan complete"
        );
        report
    }

    async fn scan_one(
        &self,
        complaint: &Complaint,
        buffer: Duration,
    ) -> CoreResult<(usize, usize)> {
        let now = self.clock.now();
        let mut created = 0;
        let mut deduplicated = 0;

        let breached = now >= complaint.response_due_at || now >= complaint.resolution_due_at;
        if breached {
            match self
                .create_deduped(
                    complaint,
                    AlertKind::SlaBreach,
                    AlertSeverity::Critical,
                    format!("SLA breached on complaint #{}", complaint.id),
                    format!(
                        "Complaint #{} ({}) has passed an SLA deadline.",
                        complaint.id, complaint.subject
                    ),
                    now,
                )
                .await?
            {
                Some(_) => created += 1,
                None => deduplicated += 1,
            }
        } else if now + buffer >= complaint.response_due_at {
            match self
                .create_deduped(
                    complaint,
                    AlertKind::SlaAtRisk,
                    AlertSeverity::Warning,
                    format!("SLA at risk on complaint #{}", complaint.id),
                    format!(
                        "Complaint #{} ({}) is within {} hour(s) of its response deadline.",
                        complaint.id,
                        complaint.subject,
                        buffer.num_hours(),
                    ),
                    now,
                )
                .await?
            {
                Some(_) => created += 1,
                None => deduplicated += 1,
            }
        }
        Ok((created, deduplicated))
    }

    /// One critical-complaint scanner pass over the last scan window.
    #[instrument(skip_all)]
    pub async fn run_critical_scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        let now = self.clock.now();
        let interval =
            Duration::seconds(i64::try_from(self.rules.critical_scan_interval_secs).unwrap_or(600));
        let since = {
            let mut last = self.last_critical_scan.lock().await;
            let since = last.unwrap_or(now - interval);
            *last = Some(now);
            since
        };

        let complaints = match self.complaints.list_created_since(since).await {
            Ok(complaints) => complaints,
            Err(err) => {
                error!(%err, "critical scan could not list complaints");
                report.errors += 1;
                return report;
            },
        };

        for complaint in complaints
            .iter()
            .filter(|c| c.priority == ComplaintPriority::Critical)
        {
            report.scanned += 1;
            match self
                .create_deduped(
                    complaint,
                    AlertKind::CriticalComplaint,
                    AlertSeverity::Critical,
                    format!("Critical complaint #{}", complaint.id),
                    format!(
                        "A critical-priority complaint was filed: {}.",
                        complaint.subject
                    ),
                    now,
                )
                .await
            {
                Ok(Some(_)) => report.created += 1,
                Ok(None) => report.deduplicated += 1,
                Err(err) => {
                    error!(complaint = %complaint.id, %err, "critical scan row failed");
                    report.errors += 1;
                },
            }
        }
        info!(
            scanned = report.scanned,
            created = report.created,
            deduplicated = report.deduplicated,
            errors = report.errors,
            "critical scan complete"
        );
        report
    }

    /// Create an alert unless the dedup rule suppresses it.
    async fn create_deduped(
        &self,
        complaint: &Complaint,
        kind: AlertKind,
        severity: AlertSeverity,
        title: String,
        message: String,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<Alert>> {
        let resource = ResourceRef::new(ResourceKind::Complaint, complaint.id);
        let window_start = now - self.rules.dedup_window();
        if self
            .alerts
            .find_recent(kind, &resource, window_start)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let mut metadata = HashMap::new();
        metadata.insert("priority".to_string(), serde_json::json!(complaint.priority.to_string()));
        metadata.insert(
            "response_due_at".to_string(),
            serde_json::json!(complaint.response_due_at.to_rfc3339()),
        );

        let alert = self
            .alerts
            .insert(NewAlert {
                kind,
                severity,
                title,
                message,
                resource: resource.clone(),
                // Target the assignee when there is one, else broadcast.
                staff_ref: complaint.assigned_staff,
                metadata,
                created_at: now,
                expires_at: Some(now + Duration::hours(self.rules.alert_expiry_hours)),
            })
            .await?;

        self.audit
            .record(AuditEntry::alert_write(
                None,
                format!("alert_created:{kind}"),
                ResourceRef::new(ResourceKind::Alert, alert.id),
                now,
            ))
            .await?;
        Ok(Some(alert))
    }

    /// List alerts visible to a staff member; the read is audited.
    ///
    /// # Errors
    ///
    /// Propagates repository errors.
    pub async fn list_alerts(
        &self,
        staff: StaffId,
        mut filter: AlertFilter,
        page: Page,
    ) -> CoreResult<Vec<Alert>> {
        let now = self.clock.now();
        filter.staff = Some(staff);
        let alerts = self.alerts.list(filter, page, now).await?;
        self.audit
            .record(AuditEntry::ops_read(
                Some(staff),
                "alerts_listed",
                ResourceRef { kind: ResourceKind::Alert, id: format!("count:{}", alerts.len()) },
                now,
            ))
            .await?;
        Ok(alerts)
    }

    /// Mark an alert read.
    ///
    /// # Errors
    ///
    /// Returns `AlertNotFound` for unknown ids.
    pub async fn mark_read(&self, id: AlertId, staff: StaffId) -> CoreResult<Alert> {
        let now = self.clock.now();
        let alert = self.alerts.mark_read(id, staff, now).await?;
        self.audit
            .record(AuditEntry::alert_write(
                Some(staff),
                "alert_read",
                ResourceRef::new(ResourceKind::Alert, id),
                now,
            ))
            .await?;
        Ok(alert)
    }

    /// Dismiss an alert.
    ///
    /// # Errors
    ///
    /// Returns `AlertNotFound` for unknown ids.
    pub async fn dismiss(&self, id: AlertId, staff: StaffId) -> CoreResult<Alert> {
        let now = self.clock.now();
        let alert = self.alerts.dismiss(id, staff, now).await?;
        self.audit
            .record(AuditEntry::alert_write(
                Some(staff),
                "alert_dismissed",
                ResourceRef::new(ResourceKind::Alert, id),
                now,
            ))
            .await?;
        Ok(alert)
    }

    /// Unread, unexpired alert count for a staff member.
    ///
    /// # Errors
    ///
    /// Propagates repository errors.
    pub async fn unread_count(&self, staff: StaffId) -> CoreResult<u64> {
        self.alerts.unread_count(staff, self.clock.now()).await
    }
}
