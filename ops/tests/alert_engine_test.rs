//! Alert engine: SLA scanner, critical scanner, dedup, expiry, audit.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code

use chrono::Duration;
use convergeai_core::clock::Clock;
use convergeai_core::config::{shared, AlertRules, RuntimeConfig, SlaPolicy};
use convergeai_core::repo::{AlertRepo, AuditRepo, ComplaintRepo, Page};
use convergeai_core::types::alert::{AlertFilter, AlertKind, AlertSeverity};
use convergeai_core::types::complaint::{ComplaintPriority, ComplaintType, NewComplaint};
use convergeai_core::types::ids::{StaffId, UserId};
use convergeai_ops::AlertEngine;
use convergeai_testing::{FixedClock, InMemoryAlertRepo, InMemoryAuditRepo, InMemoryComplaintRepo};
use std::sync::Arc;

struct World {
    engine: AlertEngine,
    complaints: Arc<InMemoryComplaintRepo>,
    alerts: Arc<InMemoryAlertRepo>,
    audit: Arc<InMemoryAuditRepo>,
    clock: Arc<FixedClock>,
}

fn world() -> World {
    let complaints = Arc::new(InMemoryComplaintRepo::new());
    let alerts = Arc::new(InMemoryAlertRepo::new());
    let audit = Arc::new(InMemoryAuditRepo::new());
    let clock = Arc::new(FixedClock::monday_morning());
    let engine = AlertEngine::new(
        Arc::clone(&complaints) as Arc<dyn ComplaintRepo>,
        Arc::clone(&alerts) as Arc<dyn AlertRepo>,
        Arc::clone(&audit) as Arc<dyn AuditRepo>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        shared(RuntimeConfig::default()),
        AlertRules::default(),
    );
    World { engine, complaints, alerts, audit, clock }
}

impl World {
    async fn file_complaint(&self, priority: ComplaintPriority) -> convergeai_core::types::complaint::Complaint {
        let now = self.clock.now();
        let (response_due_at, resolution_due_at) =
            SlaPolicy::default().deadlines(priority, now).expect("sla row");
        self.complaints
            .seed(NewComplaint {
                user_ref: UserId::new(1),
                booking_ref: None,
                session_ref: None,
                complaint_type: ComplaintType::ServiceQuality,
                subject: "service quality complaint".to_string(),
                description: "the repair left the unit leaking".to_string(),
                priority,
                sentiment: -0.4,
                response_due_at,
                resolution_due_at,
                created_at: now,
            })
            .await
            .expect("seed complaint")
    }
}

#[tokio::test]
async fn test_sla_lifecycle_at_risk_then_breach_with_dedup() {
    let world = world();
    // High priority: respond within 4 hours; buffer is 1 hour.
    let complaint = world.file_complaint(ComplaintPriority::High).await;

    // T0+3h05m: within the buffer window, an at-risk warning fires.
    world.clock.advance(Duration::hours(3) + Duration::minutes(5));
    let report = world.engine.run_sla_scan().await;
    assert_eq!(report.created, 1);
    assert_eq!(report.errors, 0);

    // Re-running immediately creates nothing: dedup within 24 hours.
    let report = world.engine.run_sla_scan().await;
    assert_eq!(report.created, 0);
    assert_eq!(report.deduplicated, 1);

    // T0+4h01m: the deadline passed, a breach fires (the at-risk alert
    // does not block it - different kind, different dedup key).
    world.clock.advance(Duration::minutes(56));
    let report = world.engine.run_sla_scan().await;
    assert_eq!(report.created, 1);

    // And the breach dedups on subsequent scans too.
    let report = world.engine.run_sla_scan().await;
    assert_eq!(report.created, 0);
    assert_eq!(report.deduplicated, 1);

    // Exactly one alert of each kind exists for this complaint.
    let all = world.alerts.all().await;
    let at_risk: Vec<_> = all.iter().filter(|a| a.kind == AlertKind::SlaAtRisk).collect();
    let breaches: Vec<_> = all.iter().filter(|a| a.kind == AlertKind::SlaBreach).collect();
    assert_eq!(at_risk.len(), 1);
    assert_eq!(breaches.len(), 1);
    assert_eq!(at_risk[0].severity, AlertSeverity::Warning);
    assert_eq!(breaches[0].severity, AlertSeverity::Critical);
    assert_eq!(at_risk[0].resource.id, complaint.id.to_string());
    // No assignee: both alerts broadcast.
    assert_eq!(at_risk[0].staff_ref, None);
}

#[tokio::test]
async fn test_assigned_complaint_targets_staff() {
    let world = world();
    let complaint = world.file_complaint(ComplaintPriority::High).await;
    world
        .complaints
        .assign(complaint.id, StaffId::new(42))
        .await
        .expect("assign");

    world.clock.advance(Duration::hours(5));
    world.engine.run_sla_scan().await;

    let all = world.alerts.all().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].staff_ref, Some(StaffId::new(42)));
}

#[tokio::test]
async fn test_no_alert_with_time_in_hand() {
    let world = world();
    world.file_complaint(ComplaintPriority::High).await;

    // T0+1h: three hours of slack remain, more than the one-hour buffer.
    world.clock.advance(Duration::hours(1));
    let report = world.engine.run_sla_scan().await;
    assert_eq!(report.scanned, 1);
    assert_eq!(report.created, 0);
    assert!(world.alerts.all().await.is_empty());
}

#[tokio::test]
async fn test_resolved_complaints_are_not_scanned() {
    let world = world();
    let complaint = world.file_complaint(ComplaintPriority::High).await;
    world
        .complaints
        .set_status(
            complaint.id,
            convergeai_core::types::complaint::ComplaintStatus::Resolved,
            Some(StaffId::new(1)),
            None,
            Some("replaced the part".to_string()),
            world.clock.now(),
        )
        .await
        .expect("resolve");

    world.clock.advance(Duration::hours(10));
    let report = world.engine.run_sla_scan().await;
    assert_eq!(report.scanned, 0);
    assert!(world.alerts.all().await.is_empty());
}

#[tokio::test]
async fn test_critical_scanner_picks_up_new_criticals_once() {
    let world = world();
    world.file_complaint(ComplaintPriority::Critical).await;
    world.file_complaint(ComplaintPriority::Low).await;

    let report = world.engine.run_critical_scan().await;
    assert_eq!(report.scanned, 1, "only the critical complaint is considered");
    assert_eq!(report.created, 1);

    let report = world.engine.run_critical_scan().await;
    assert_eq!(report.created, 0);

    let all = world.alerts.all().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].kind, AlertKind::CriticalComplaint);
    assert_eq!(all[0].severity, AlertSeverity::Critical);
}

#[tokio::test]
async fn test_listing_excludes_expired_alerts() {
    let world = world();
    world.file_complaint(ComplaintPriority::High).await;
    world.clock.advance(Duration::hours(5));
    world.engine.run_sla_scan().await;

    let staff = StaffId::new(7);
    let listed = world
        .engine
        .list_alerts(staff, AlertFilter::default(), Page::first(10))
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(world.engine.unread_count(staff).await.expect("count"), 1);

    // Alerts auto-expire after 72 hours and disappear from listings.
    world.clock.advance(Duration::hours(73));
    let listed = world
        .engine
        .list_alerts(staff, AlertFilter::default(), Page::first(10))
        .await
        .expect("list");
    assert!(listed.is_empty());
    assert_eq!(world.engine.unread_count(staff).await.expect("count"), 0);
}

#[tokio::test]
async fn test_read_and_dismiss_flow() {
    let world = world();
    world.file_complaint(ComplaintPriority::High).await;
    world.clock.advance(Duration::hours(5));
    world.engine.run_sla_scan().await;

    let staff = StaffId::new(7);
    let alert = world.alerts.all().await.remove(0);
    let read = world.engine.mark_read(alert.id, staff).await.expect("read");
    assert!(read.is_read);
    assert!(read.read_at.is_some());
    assert_eq!(world.engine.unread_count(staff).await.expect("count"), 0);

    let dismissed = world.engine.dismiss(alert.id, staff).await.expect("dismiss");
    assert!(dismissed.is_dismissed);
    let listed = world
        .engine
        .list_alerts(staff, AlertFilter::default(), Page::first(10))
        .await
        .expect("list");
    assert!(listed.is_empty(), "dismissed alerts are hidden by default");
}

#[tokio::test]
async fn test_alert_writes_and_list_reads_are_audited() {
    let world = world();
    world.file_complaint(ComplaintPriority::High).await;
    world.clock.advance(Duration::hours(5));
    world.engine.run_sla_scan().await;

    let staff = StaffId::new(7);
    world
        .engine
        .list_alerts(staff, AlertFilter::default(), Page::first(10))
        .await
        .expect("list");

    let entries = world.audit.all().await;
    assert!(entries.iter().any(|e| e.action.starts_with("alert_created")));
    let list_read = entries
        .iter()
        .find(|e| e.action == "alerts_listed")
        .expect("list read audited");
    assert!(list_read.pii_accessed);
    assert_eq!(list_read.staff_ref, Some(staff));

    // Scanner writes carry no staff actor.
    let write = entries
        .iter()
        .find(|e| e.action.starts_with("alert_created"))
        .expect("write audited");
    assert_eq!(write.staff_ref, None);
    assert!(!write.pii_accessed);
}

#[tokio::test]
async fn test_dedup_window_reopens_after_24_hours() {
    let world = world();
    world.file_complaint(ComplaintPriority::High).await;

    world.clock.advance(Duration::hours(5));
    world.engine.run_sla_scan().await;
    assert_eq!(world.alerts.all().await.len(), 1);

    // 25 hours later the dedup window has passed; the complaint is still
    // open and breached, so a fresh breach alert may fire.
    world.clock.advance(Duration::hours(25));
    let report = world.engine.run_sla_scan().await;
    assert_eq!(report.created, 1);
    let breaches = world
        .alerts
        .all()
        .await
        .into_iter()
        .filter(|a| a.kind == AlertKind::SlaBreach)
        .count();
    assert_eq!(breaches, 2);
}

#[tokio::test]
async fn test_alerts_never_duplicate_within_window_property() {
    // Invariant: no two alerts share (kind, resource) within 24 hours.
    let world = world();
    world.file_complaint(ComplaintPriority::High).await;
    world.clock.advance(Duration::hours(5));

    for _ in 0..10 {
        world.engine.run_sla_scan().await;
        world.clock.advance(Duration::minutes(17));
    }

    let all = world.alerts.all().await;
    for a in &all {
        for b in &all {
            if a.id != b.id && a.kind == b.kind && a.resource == b.resource {
                let gap = (a.created_at - b.created_at).abs();
                assert!(
                    gap >= Duration::hours(24),
                    "duplicate alert within window: {a:?} vs {b:?}"
                );
            }
        }
    }
}
