//! Retry policies and the generic "retry with policy" helper.
//!
//! Backoff data is declarative: a [`RetryPolicy`] says how many attempts an
//! operation gets and how long to wait before each of them. The waiting goes
//! through an injected [`Clock`] so schedules can be asserted in tests.

use crate::clock::Clock;
use async_trait::async_trait;
use std::time::Duration;

/// Defines a policy for retrying an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before attempt 2, 3, ... The last entry repeats for later attempts.
    pub backoff: Vec<Duration>,
}

impl RetryPolicy {
    /// Policy used to bring the instrument to its baseline configuration:
    /// `retries` retries after the first attempt, 10 s / 90 s / 10 min apart.
    pub fn initialization(retries: u32) -> Self {
        Self {
            max_attempts: retries + 1,
            backoff: vec![
                Duration::from_secs(10),
                Duration::from_secs(90),
                Duration::from_secs(10 * 60),
            ],
        }
    }

    /// Wait required before the 1-based `attempt`. The first attempt starts immediately.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let index = (attempt as usize - 2).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(index).copied().unwrap_or(Duration::ZERO)
    }
}

/// An asynchronous operation that can be attempted repeatedly.
#[async_trait]
pub trait Retryable {
    /// Value produced by a successful attempt.
    type Output: Send;
    /// Error produced by a failed attempt.
    type Error: Send;

    /// Runs the 1-based `attempt`.
    async fn attempt(&mut self, attempt: u32) -> Result<Self::Output, Self::Error>;

    /// Called before sleeping ahead of `next_attempt`.
    fn on_retry(&mut self, _next_attempt: u32, _delay: Duration, _last_error: &Self::Error) {}
}

/// All attempts allowed by the policy failed.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Number of attempts that were made.
    pub attempts: u32,
    /// Error of the final attempt, if any attempt ran.
    pub last_error: Option<E>,
}

/// Runs `operation` until it succeeds or the policy's attempts are used up,
/// sleeping on `clock` according to the backoff schedule.
pub async fn retry_with_policy<R>(
    operation: &mut R,
    policy: &RetryPolicy,
    clock: &dyn Clock,
) -> Result<R::Output, RetryExhausted<R::Error>>
where
    R: Retryable + Send,
{
    let mut last_error = None;
    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            let delay = policy.delay_before(attempt);
            if let Some(err) = last_error.as_ref() {
                operation.on_retry(attempt, delay, err);
            }
            if !delay.is_zero() {
                clock.sleep(delay).await;
            }
        }
        match operation.attempt(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => last_error = Some(err),
        }
    }
    Err(RetryExhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}
