//! Exponential backoff for webhook requests.
//!
//! The wait before retry `n` (0-indexed) is `min_wait * 2^n`, capped at
//! `max_wait`. Only transient errors are retried; permanent ones are returned
//! after the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::SendError;

/// Transport retry settings for one webhook send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,

    /// Wait before the first retry.
    pub min_wait: Duration,

    /// Cap on any single wait.
    pub max_wait: Duration,

    /// Timeout for each individual request.
    pub timeout: Duration,
}

impl RetryConfig {
    /// 3 retries waiting 1s, 2s, 4s; 10s per request.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        min_wait: Duration::from_secs(1),
        max_wait: Duration::from_secs(30),
        timeout: Duration::from_secs(10),
    };

    /// Single attempt, no waiting.
    pub const NONE: Self = Self {
        max_retries: 0,
        min_wait: Duration::ZERO,
        max_wait: Duration::ZERO,
        timeout: Duration::from_secs(10),
    };

    pub fn new(
        max_retries: u32,
        min_wait: Duration,
        max_wait: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            max_retries,
            min_wait,
            max_wait,
            timeout,
        }
    }

    /// Computes the wait before the given retry (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2f64.powi(attempt.min(i32::MAX as u32) as i32);
        let delay_secs = self.min_wait.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_wait.as_secs_f64());
        Duration::from_secs_f64(capped_secs)
    }

    /// Returns an iterator over all retry delays.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|attempt| self.delay_for_attempt(attempt))
    }

    /// Total time spent waiting if every attempt fails transiently.
    pub fn total_max_wait(&self) -> Duration {
        self.delays().sum()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Result of a retried operation.
#[derive(Debug)]
pub enum RetryResult<T> {
    Success(T),

    /// Every attempt failed transiently.
    ExhaustedRetries {
        last_error: SendError,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// A non-retriable error ended the sequence early.
    PermanentError(SendError),
}

impl<T> RetryResult<T> {
    pub fn into_result(self) -> Result<T, SendError> {
        match self {
            RetryResult::Success(v) => Ok(v),
            RetryResult::ExhaustedRetries { last_error, .. } => Err(last_error),
            RetryResult::PermanentError(e) => Err(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }
}

/// Runs `operation` until it succeeds, fails permanently, or runs out of
/// retries, sleeping between attempts according to `config`.
pub async fn retry_with_backoff<T, F, Fut>(config: RetryConfig, mut operation: F) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SendError>>,
{
    let max_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) => {
                attempt += 1;

                if !e.kind().is_retriable() {
                    return RetryResult::PermanentError(e);
                }
                if attempt >= max_attempts {
                    return RetryResult::ExhaustedRetries {
                        last_error: e,
                        attempts: attempt,
                    };
                }

                let delay = config.delay_for_attempt(attempt - 1);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Webhook attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
