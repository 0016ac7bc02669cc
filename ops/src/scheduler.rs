//! Background scanner loops.
//!
//! Cooperative tasks consuming a tick: each iteration is one bounded scan.
//! A `watch` channel stops the loops cleanly on shutdown. Scanners run on
//! their own schedule independent of request tasks and never touch session
//! state.

use crate::alerts::AlertEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Join handles for the spawned scanner loops
pub struct ScannerHandles {
    /// SLA scanner loop
    pub sla: JoinHandle<()>,
    /// Critical-complaint scanner loop
    pub critical: JoinHandle<()>,
}

/// Spawn both scanner loops with intervals from the engine's rules.
///
/// Send `true` on the shutdown channel to stop them.
#[must_use]
pub fn spawn_scanners(
    engine: Arc<AlertEngine>,
    shutdown: watch::Receiver<bool>,
) -> ScannerHandles {
    let sla_interval = Duration::from_secs(engine.rules().sla_scan_interval_secs);
    let critical_interval = Duration::from_secs(engine.rules().critical_scan_interval_secs);

    let sla = tokio::spawn(scan_loop(
        Arc::clone(&engine),
        sla_interval,
        shutdown.clone(),
        ScanKind::Sla,
    ));
    let critical = tokio::spawn(scan_loop(engine, critical_interval, shutdown, ScanKind::Critical));
    ScannerHandles { sla, critical }
}

#[derive(Clone, Copy, Debug)]
enum ScanKind {
    Sla,
    Critical,
}

async fn scan_loop(
    engine: Arc<AlertEngine>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    kind: ScanKind,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so the loop waits a full
    // period before its first scan.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match kind {
                    ScanKind::Sla => { engine.run_sla_scan().await; },
                    ScanKind::Critical => { engine.run_critical_scan().await; },
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(?kind, "scanner loop stopping");
                    break;
                }
            },
        }
    }
}
