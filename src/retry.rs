//! Bounded retry combinator.
//!
//! Freshly uploaded files are not always servable right away, so intake
//! polls for them a fixed number of times at a fixed interval. The loop
//! terminates on its own once the attempt budget is spent; there is no
//! other cancellation.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// How many times to check and how long to wait between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("still unavailable after {attempts} attempts")]
pub struct RetryExhausted {
    pub attempts: u32,
}

/// Run `check` until it reports ready or the budget is spent.
///
/// The check receives the 1-based attempt number. The delay is only taken
/// between attempts, never after the last one. Returns the attempt that
/// succeeded.
pub async fn until_ready<F, Fut>(policy: RetryPolicy, mut check: F) -> Result<u32, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.max_attempts {
        if check(attempt).await {
            return Ok(attempt);
        }
        debug!(attempt, max = policy.max_attempts, "not ready yet");
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Err(RetryExhausted {
        attempts: policy.max_attempts,
    })
}
