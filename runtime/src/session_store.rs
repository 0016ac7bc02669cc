//! Session store: opaque id minting, per-session serialization, idle
//! expiry.
//!
//! Turns against one session are serialized by a per-session mutex held
//! from load through append; turns against different sessions run fully in
//! parallel. Sessions are closed on idle expiry, never deleted; a closed
//! or expired session id mints a fresh session.

use convergeai_core::clock::Clock;
use convergeai_core::config::SharedConfig;
use convergeai_core::error::{CoreError, CoreResult};
use convergeai_core::repo::SessionRepo;
use convergeai_core::types::ids::{SessionId, UserId};
use convergeai_core::types::session::{Channel, Session, SessionStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument};

/// Attempts at minting a collision-free session id.
const MINT_ATTEMPTS: usize = 3;

/// Session lifecycle façade over the session repository
pub struct SessionStore {
    repo: Arc<dyn SessionRepo>,
    clock: Arc<dyn Clock>,
    config: SharedConfig,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionStore {
    /// Create a store.
    #[must_use]
    pub fn new(repo: Arc<dyn SessionRepo>, clock: Arc<dyn Clock>, config: SharedConfig) -> Self {
        Self { repo, clock, config, locks: Mutex::new(HashMap::new()) }
    }

    /// Underlying repository, for read paths that need no locking.
    #[must_use]
    pub fn repo(&self) -> Arc<dyn SessionRepo> {
        Arc::clone(&self.repo)
    }

    /// Acquire the per-session mutex. Held guards serialize turns against
    /// the same session for the duration of load-through-append.
    pub async fn lock(&self, session_id: &SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(session_id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Load the session if it exists, is open and not idle-expired;
    /// otherwise mint a fresh one. Expired sessions are closed first.
    ///
    /// # Errors
    ///
    /// Propagates repository errors; id collisions are retried up to
    /// [`MINT_ATTEMPTS`] times before surfacing.
    #[instrument(skip(self))]
    pub async fn open_or_load(
        &self,
        session_id: Option<SessionId>,
        user_ref: UserId,
        channel: Channel,
    ) -> CoreResult<Session> {
        let now = self.clock.now();
        let timeout = self.config.read().await.session_idle_timeout();

        if let Some(id) = session_id {
            if let Some(session) = self.repo.get(&id).await? {
                if session.is_open() && !session.is_idle_expired(now, timeout) {
                    return Ok(session);
                }
                if session.is_open() {
                    info!(session = %id, "closing idle-expired session");
                    self.repo.close(&id).await?;
                }
            } else {
                debug!(session = %id, "unknown session id, minting a fresh session");
            }
        }

        let mut last_error = None;
        for _ in 0..MINT_ATTEMPTS {
            let session = Session {
                session_id: SessionId::generate(),
                user_ref,
                channel,
                status: SessionStatus::Open,
                active_workflow: None,
                created_at: now,
                last_activity_at: now,
            };
            match self.repo.create(session.clone()).await {
                Ok(()) => return Ok(session),
                Err(err @ CoreError::DatabaseTransient(_)) => last_error = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            CoreError::DatabaseTransient("session id minting failed".to_string())
        }))
    }

    /// Close every open session idle longer than the configured timeout.
    ///
    /// # Errors
    ///
    /// Propagates repository errors from the listing; per-session close
    /// failures are logged and skipped.
    pub async fn expire_idle(&self) -> CoreResult<usize> {
        let now = self.clock.now();
        let timeout = self.config.read().await.session_idle_timeout();
        let idle = self.repo.find_idle(now, timeout).await?;
        let mut closed = 0;
        for id in idle {
            match self.repo.close(&id).await {
                Ok(()) => closed += 1,
                Err(err) => tracing::warn!(session = %id, %err, "failed to close idle session"),
            }
        }
        if closed > 0 {
            info!(closed, "idle session sweep complete");
        }
        Ok(closed)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use super::*;
    use chrono::Duration;
    use convergeai_core::config::{shared, RuntimeConfig};
    use convergeai_testing::{FixedClock, InMemorySessionRepo};

    fn store() -> (SessionStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::monday_morning());
        let store = SessionStore::new(
            Arc::new(InMemorySessionRepo::new()),
            Arc::clone(&clock) as Arc<dyn Clock>,
            shared(RuntimeConfig::default()),
        );
        (store, clock)
    }

    #[tokio::test]
    async fn test_open_or_load_mints_when_absent() {
        let (store, _clock) = store();
        let session = store
            .open_or_load(None, UserId::new(1), Channel::Web)
            .await
            .expect("create");
        assert!(session.is_open());

        let again = store
            .open_or_load(Some(session.session_id.clone()), UserId::new(1), Channel::Web)
            .await
            .expect("load");
        assert_eq!(again.session_id, session.session_id);
    }

    #[tokio::test]
    async fn test_idle_expiry_mints_fresh_session() {
        let (store, clock) = store();
        let session = store
            .open_or_load(None, UserId::new(1), Channel::Web)
            .await
            .expect("create");

        clock.advance(Duration::minutes(31));
        let fresh = store
            .open_or_load(Some(session.session_id.clone()), UserId::new(1), Channel::Web)
            .await
            .expect("reopen");
        assert_ne!(fresh.session_id, session.session_id);

        // The old session is closed, not deleted.
        let old = store
            .repo()
            .get(&session.session_id)
            .await
            .expect("get")
            .expect("still stored");
        assert_eq!(old.status, SessionStatus::Closed);
    }

    #[tokio::test]
    async fn test_expire_idle_sweep() {
        let (store, clock) = store();
        store
            .open_or_load(None, UserId::new(1), Channel::Web)
            .await
            .expect("create");
        clock.advance(Duration::minutes(45));
        let closed = store.expire_idle().await.expect("sweep");
        assert_eq!(closed, 1);
        assert_eq!(store.expire_idle().await.expect("sweep again"), 0);
    }
}
