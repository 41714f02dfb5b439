//! Bounded fixed-interval retry policy.
//!
//! Models an asynchronous remote provisioning step that has no push
//! notification: poll at a fixed interval, stop on the first result, fail
//! with a terminal error once the attempt budget is exhausted. The policy is
//! a standalone object so orchestration code does not hard-code the loop and
//! the schedule can be swapped without touching callers.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Default attempt budget for macaroon baking.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;

/// Default pause between polling attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Hard ceiling on polling attempts.
    pub max_attempts: u32,
    /// Fixed pause before each attempt.
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Poll `attempt` until it yields a value.
    ///
    /// Sleeps `interval` before every attempt, including the first. An
    /// attempt returning `Ok(None)` means "not ready yet"; an `Err` aborts
    /// the loop immediately. Exhausting the budget fails with
    /// [`Error::ProvisioningTimeout`].
    pub async fn poll<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        for n in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;
            match attempt(n).await? {
                Some(value) => {
                    debug!(attempt = n, "poll succeeded");
                    return Ok(value);
                }
                None => debug!(attempt = n, max = self.max_attempts, "poll not ready"),
            }
        }
        Err(Error::ProvisioningTimeout {
            attempts: self.max_attempts,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_first_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();

        let counter = Arc::clone(&calls);
        let result = policy
            .poll(|n| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(if n >= 3 { Some("ready") } else { None })
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "ready");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhausts_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(15, Duration::from_secs(1));

        let counter = Arc::clone(&calls);
        let result: Result<()> = policy
            .poll(|_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::ProvisioningTimeout { attempts: 15 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_aborts_on_error() {
        let policy = RetryPolicy::default();

        let result: Result<()> = policy
            .poll(|n| async move {
                if n == 2 {
                    Err(Error::Remote("node unreachable".into()))
                } else {
                    Ok(None)
                }
            })
            .await;

        assert!(matches!(result, Err(Error::Remote(_))));
    }
}
