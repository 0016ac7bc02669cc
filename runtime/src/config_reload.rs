//! Hot-reload poller for the runtime configuration.
//!
//! Re-reads the environment on a fixed poll (default 60 seconds) and swaps
//! the shared config when the values changed and validate. Invalid reloads
//! are logged and skipped; the last good configuration stays active.

use convergeai_core::config::{RuntimeConfig, SharedConfig};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Default poll period.
pub const DEFAULT_POLL: Duration = Duration::from_secs(60);

/// Spawn the config poller. Send `true` on the shutdown channel to stop.
#[must_use]
pub fn spawn_config_poller(
    config: SharedConfig,
    poll: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match RuntimeConfig::from_env() {
                        Ok(fresh) => {
                            let mut current = config.write().await;
                            if *current != fresh {
                                info!(?fresh, "runtime configuration reloaded");
                                *current = fresh;
                            }
                        },
                        Err(err) => {
                            warn!(%err, "config reload failed, keeping last good values");
                        },
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("config poller stopping");
                        break;
                    }
                },
            }
        }
    })
}
