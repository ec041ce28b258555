//! Fixed-delay retry policy.
//!
//! Used for balance reads (one retry after 1.5 s on transient RPC errors) and
//! for the chain switch before checkout (no retry by default).

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many times to attempt an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before each retry, in milliseconds.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Balance reads: one retry after 1.5 seconds.
    pub const BALANCE_READ: Self = Self {
        max_attempts: 2,
        backoff_ms: 1_500,
    };

    /// A single attempt, no retry.
    pub const ONCE: Self = Self {
        max_attempts: 1,
        backoff_ms: 0,
    };

    /// Creates a policy.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff_ms: backoff.as_millis() as u64,
        }
    }

    /// Delay between attempts.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are exhausted. The last error is returned.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt.
    pub async fn run<T, E, F, Fut, R>(&self, mut op: F, retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && retryable(&err) => {
                    tracing::debug!(
                        attempt,
                        backoff_ms = self.backoff_ms,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(self.backoff()).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::BALANCE_READ
    }
}
