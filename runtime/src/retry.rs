//! One-retry resilience for upstream failures.
//!
//! The policy is deliberately narrow: upstream failures get exactly one
//! retry after a 0-250 ms jitter sleep, then surface as a transient reply
//! with any workflow draft preserved.

use convergeai_agents::AgentOutcome;
use convergeai_core::error::{CoreError, CoreResult, ErrorKind};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Maximum jitter before the single retry, in milliseconds.
const JITTER_MS: u64 = 250;

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=JITTER_MS))
}

/// Retry a fallible operation once if the first failure is retryable.
///
/// # Errors
///
/// Returns the second attempt's error, or the first if it was not
/// retryable.
pub async fn retry_once<F, Fut, T>(operation: F) -> CoreResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable() => {
            let delay = jitter();
            warn!(%err, delay_ms = delay.as_millis() as u64, "upstream failure, retrying once");
            sleep(delay).await;
            operation().await
        },
        Err(err) => Err(err),
    }
}

/// Retry an agent execution once when its outcome reports an upstream
/// failure. Outcomes carrying any other error kind, or none, pass through.
pub async fn retry_agent_outcome<F, Fut>(run: F) -> AgentOutcome
where
    F: Fn() -> Fut,
    Fut: Future<Output = AgentOutcome>,
{
    let first = run().await;
    if first.error == Some(ErrorKind::Upstream) {
        let delay = jitter();
        warn!(
            action = %first.action_taken,
            delay_ms = delay.as_millis() as u64,
            "agent reported upstream failure, retrying once"
        );
        sleep(delay).await;
        return run().await;
    }
    first
}

/// Map an upstream error to the standard transient outcome check.
#[must_use]
pub fn is_transient(error: &CoreError) -> bool {
    matches!(error.kind(), ErrorKind::Upstream | ErrorKind::Deadline)
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Tests can use expect
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_once_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let result = retry_once(|| {
            let calls = Arc::clone(&calls_clone);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(CoreError::DatabaseTransient("blip".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.expect("recovered"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_once_gives_up_after_second_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let result: CoreResult<i32> = retry_once(|| {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::LlmUnavailable("down".to_string()))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let result: CoreResult<i32> = retry_once(|| {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::Invariant("broken".to_string()))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_agent_outcome_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let outcome = retry_agent_outcome(|| {
            let calls = Arc::clone(&calls_clone);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    AgentOutcome::failed(ErrorKind::Upstream, "flaky")
                } else {
                    AgentOutcome::reply("ok now", "recovered")
                }
            }
        })
        .await;
        assert_eq!(outcome.reply_text, "ok now");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
