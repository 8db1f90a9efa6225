// ABOUTME: Bounded-attempt retry combinator shared by the provider and engine layers.
// ABOUTME: Retries unconditionally on failure and surfaces the last error.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before attempt `n + 1`, given the 1-based attempt `n` that failed.
    pub backoff: Option<fn(u32) -> Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: None,
        }
    }

    pub fn with_backoff(mut self, backoff: fn(u32) -> Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Effective attempt count. A policy of zero still runs once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// `op` receives the 1-based attempt number. There is no branching on the
/// kind of failure here; callers inspect the final error themselves.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                tracing::debug!(attempt, "giving up after {attempts} attempt(s): {e}");
                return Err(e);
            }
            Err(e) => {
                tracing::debug!(attempt, "attempt failed, retrying: {e}");
                if let Some(backoff) = policy.backoff {
                    tokio::time::sleep(backoff(attempt)).await;
                }
                attempt += 1;
            }
        }
    }
}
