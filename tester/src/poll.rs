//! Condition Polling
//!
//! `PollCondition` is the one synchronization primitive of the harness: every
//! "wait until X" (HTTP readiness, container presence or absence, checkpoint
//! keys) goes through it. The check runs at a fixed interval with no backoff.
//! A check that errors counts as "not yet", never as a failure.

use crate::error::{HarnessError, HarnessResult};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, trace, warn};

/// Interval used when a caller does not pick one
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// A named wait with a total budget and a fixed polling interval
#[derive(Debug, Clone)]
pub struct PollCondition {
    description: String,
    timeout: Duration,
    interval: Duration,
}

impl PollCondition {
    /// Build a condition, rejecting intervals that could never terminate
    ///
    /// Requires `0 < interval <= timeout`.
    pub fn new(description: impl Into<String>, timeout: Duration, interval: Duration) -> HarnessResult<Self> {
        let description = description.into();
        if interval.is_zero() {
            return Err(HarnessError::InvalidPoll {
                condition: description,
                reason: "interval must be greater than zero".to_string(),
            });
        }
        if interval > timeout {
            return Err(HarnessError::InvalidPoll {
                condition: description,
                reason: format!("interval {interval:?} exceeds timeout {timeout:?}"),
            });
        }
        Ok(Self {
            description,
            timeout,
            interval,
        })
    }

    /// Same as [`PollCondition::new`] with [`DEFAULT_INTERVAL`], clamped to the timeout
    pub fn with_default_interval(description: impl Into<String>, timeout: Duration) -> HarnessResult<Self> {
        Self::new(description, timeout, DEFAULT_INTERVAL.min(timeout))
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `check` until it yields `Ok(true)` or the budget runs out
    ///
    /// Returns the elapsed time on success. A single check is cut off once it
    /// outlives both the remaining budget and one interval, so a hung check
    /// cannot stretch the wait.
    pub async fn wait<F, Fut, E>(&self, mut check: F) -> HarnessResult<Duration>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);
            let budget = deadline.saturating_duration_since(Instant::now()).max(self.interval);

            match timeout(budget, check()).await {
                Ok(Ok(true)) => {
                    let elapsed = start.elapsed();
                    debug!(
                        condition = %self.description,
                        attempts,
                        "✅ Condition met after {:?}",
                        elapsed
                    );
                    return Ok(elapsed);
                }
                Ok(Ok(false)) => {
                    trace!(condition = %self.description, attempts, "Condition not met yet");
                }
                Ok(Err(err)) => {
                    debug!(condition = %self.description, attempts, "Check failed, retrying: {}", err);
                }
                Err(_) => {
                    debug!(condition = %self.description, attempts, "Check exceeded {:?}, retrying", budget);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let waited = now.duration_since(start);
                warn!(condition = %self.description, attempts, "⏰ Gave up after {:?}", waited);
                return Err(HarnessError::TimedOut {
                    condition: self.description.clone(),
                    waited,
                    attempts,
                });
            }

            sleep(self.interval.min(deadline - now)).await;
        }
    }

    /// Poll an infallible check
    pub async fn wait_until<F, Fut>(&self, mut check: F) -> HarnessResult<Duration>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        self.wait(|| {
            let fut = check();
            async move { Ok::<_, std::convert::Infallible>(fut.await) }
        })
        .await
    }
}

/// One-shot form of [`PollCondition::wait`]
pub async fn wait_for<F, Fut, E>(
    description: impl Into<String>,
    timeout: Duration,
    interval: Duration,
    check: F,
) -> HarnessResult<Duration>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
{
    PollCondition::new(description, timeout, interval)?.wait(check).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_interval() {
        let err = PollCondition::new("zero", Duration::from_secs(1), Duration::ZERO).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidPoll { .. }));
    }

    #[test]
    fn test_rejects_interval_longer_than_timeout() {
        let err = PollCondition::new("long", Duration::from_millis(10), Duration::from_millis(20)).unwrap_err();
        assert!(err.to_string().contains("exceeds timeout"));
    }

    #[test]
    fn test_default_interval_is_clamped() {
        let condition = PollCondition::with_default_interval("short", Duration::from_millis(30)).unwrap();
        assert_eq!(condition.interval(), Duration::from_millis(30));
        assert_eq!(condition.description(), "short");
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success_returns_without_sleeping() {
        let condition = PollCondition::new("ready", Duration::from_secs(1), Duration::from_millis(100)).unwrap();
        let elapsed = condition.wait_until(|| async { true }).await.unwrap();
        assert_eq!(elapsed, Duration::ZERO);
    }
}
