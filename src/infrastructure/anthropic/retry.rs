//! Retry policy with exponential backoff for Claude API requests.
//!
//! Retries on 429 and 5xx responses and on network errors; client errors
//! (400/401/403/404) fail immediately.

use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};

/// Whether a failed call is worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504 | 529)
}

/// Exponential backoff policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

/// Error classification for [`RetryPolicy::execute`].
#[derive(Debug)]
pub enum CallError {
    Retryable(String),
    Permanent(String),
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Execute an operation, retrying retryable failures with doubling
    /// backoff up to `max_retries`.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> DomainResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let mut attempt = 0;
        let mut backoff_ms = self.initial_backoff_ms;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(CallError::Permanent(message)) => {
                    return Err(DomainError::PlanFailed(message));
                }
                Err(CallError::Retryable(message)) => {
                    if attempt >= self.max_retries {
                        return Err(DomainError::PlanFailed(format!(
                            "{} (after {} retries)",
                            message, self.max_retries
                        )));
                    }
                    attempt += 1;
                    warn!(attempt, backoff_ms, error = %message, "retrying Claude API call");
                    sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(self.max_backoff_ms);
                }
            }
        }
    }
}
