//! Retry with exponential backoff
//!
//! Shared by apply and rollback. Classification is delegated to
//! `PortError::is_retryable`: client errors other than 429 stop at once,
//! everything else is retried.
//!
//! ```text
//! wait(attempt) = max(base * 2^attempt, retry_after)    attempt is 1-based
//! ```
//!
//! No wait happens after the final attempt.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use core_kernel::PortError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Terminal failure of a retried operation
#[derive(Debug, Error)]
pub enum RetryError {
    /// The error is known to be unsatisfiable; no further attempts were made
    #[error("{error}")]
    NonRetryable { error: PortError, attempts: u32 },

    #[error("max attempts exceeded ({attempts}): {error}")]
    Exhausted { error: PortError, attempts: u32 },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::NonRetryable { attempts, .. } | RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn last_error(&self) -> &PortError {
        match self {
            RetryError::NonRetryable { error, .. } | RetryError::Exhausted { error, .. } => error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    /// A `max_attempts` of 0 is treated as 1
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Wait before the attempt following `attempt`
    pub fn delay_after(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let backoff = self.base_delay.saturating_mul(factor);
        match retry_after {
            Some(hint) => backoff.max(hint),
            None => backoff,
        }
    }

    /// Runs `operation` until it succeeds, fails permanently or runs out of
    /// attempts
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PortError>>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(RetryError::NonRetryable { error, attempts: attempt });
            }
            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted { error, attempts: attempt });
            }

            let wait = self.delay_after(attempt, error.retry_after());
            warn!(
                operation = label,
                attempt,
                wait_ms = wait.as_millis() as u64,
                error = %error,
                "Retrying after failure"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}
