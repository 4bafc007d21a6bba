//! Bounded polling for UI state
//!
//! All waiting in the harness goes through [`wait_for`]. There are no fixed
//! sleeps in the checks: a predicate is sampled at a fixed interval until it
//! holds or the timeout elapses, and each sample is itself bounded by the time
//! remaining, so a hung evaluation cannot overrun the deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::trace;

use crate::error::HarnessError;

/// Result of a bounded wait; a timeout is a normal outcome, not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
}

impl WaitOutcome {
    pub fn is_satisfied(self) -> bool {
        self == WaitOutcome::Satisfied
    }
}

/// Evaluate `predicate` every `interval` until it returns `true` or `limit` elapses.
///
/// The predicate is evaluated at least once, even with a zero timeout; that
/// first sample is bounded by the larger of `limit` and `interval`.
/// Evaluation errors are propagated immediately.
pub async fn wait_for<F, Fut>(
    mut predicate: F,
    limit: Duration,
    interval: Duration,
) -> Result<WaitOutcome, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, HarnessError>>,
{
    let deadline = Instant::now() + limit;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());

        // The first sample gets at least one interval so zero timeouts still observe state
        let bound = if attempts == 1 {
            remaining.max(interval)
        } else {
            remaining
        };
        let sample = match timeout(bound, predicate()).await {
            Ok(result) => Some(result?),
            Err(_) => None,
        };

        if sample == Some(true) {
            trace!(attempts, "Predicate satisfied");
            return Ok(WaitOutcome::Satisfied);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            trace!(attempts, ?limit, "Predicate timed out");
            return Ok(WaitOutcome::TimedOut);
        }
        sleep(interval.min(remaining)).await;
    }
}

/// Whether `predicate` stays false for the whole of `window`.
///
/// Used for negative assertions such as "the panel does not close".
pub async fn holds_false<F, Fut>(
    predicate: F,
    window: Duration,
    interval: Duration,
) -> Result<bool, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, HarnessError>>,
{
    Ok(wait_for(predicate, window, interval).await? == WaitOutcome::TimedOut)
}

/// Timeout and interval pair shared by a check's waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Poller {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub async fn until<F, Fut>(&self, predicate: F) -> Result<WaitOutcome, HarnessError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, HarnessError>>,
    {
        wait_for(predicate, self.timeout, self.interval).await
    }

    pub async fn never<F, Fut>(&self, predicate: F) -> Result<bool, HarnessError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, HarnessError>>,
    {
        holds_false(predicate, self.timeout, self.interval).await
    }
}
