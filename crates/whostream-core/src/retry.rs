//! Bounded retry with pluggable backoff
//!
//! [`RetryPolicy`] runs a fallible async operation up to `max_attempts`
//! times. The first failure is retried immediately; every later failure
//! waits for whatever the [`Backoff`] says. An optional transient-error
//! predicate turns non-transient failures into an immediate abort, and an
//! optional observer is told about each wait before it happens.
//!
//! # Examples
//!
//! ```no_run
//! use whostream_core::retry::{ExponentialBackoff, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let policy: RetryPolicy<std::io::Error> =
//!     RetryPolicy::new(ExponentialBackoff::new(Duration::from_millis(100)), 5)
//!         .with_transient(|e: &std::io::Error| e.kind() == std::io::ErrorKind::TimedOut);
//!
//! let contents = policy
//!     .execute(|| async { tokio::fs::read_to_string("snapshot.csv").await })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Computes how long to wait before the next attempt
pub trait Backoff: Send + Sync {
    /// Wait time after the `retry_number`-th failure (1-based)
    fn wait_time(&self, retry_number: u32) -> Duration;
}

/// Doubling backoff: `base * 2^(n - 1)`, capped at `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Default ceiling for a single wait
    pub const DEFAULT_MAX: Duration = Duration::from_secs(30);

    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: Self::DEFAULT_MAX,
        }
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }
}

impl Backoff for ExponentialBackoff {
    fn wait_time(&self, retry_number: u32) -> Duration {
        let exponent = retry_number.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

type TransientPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Retry configuration for operations failing with `E`
pub struct RetryPolicy<E> {
    max_attempts: u32,
    backoff: Arc<dyn Backoff>,
    is_transient: Option<TransientPredicate<E>>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            backoff: Arc::clone(&self.backoff),
            is_transient: self.is_transient.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("classifies_errors", &self.is_transient.is_some())
            .finish()
    }
}

impl<E> RetryPolicy<E> {
    /// Create a policy that treats every error as transient
    ///
    /// `max_attempts` counts the first call; values below 1 are raised to 1.
    pub fn new(backoff: impl Backoff + 'static, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Arc::new(backoff),
            is_transient: None,
        }
    }

    /// Only retry errors for which `predicate` returns true
    pub fn with_transient(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.is_transient = Some(Arc::new(predicate));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait applied after the `retry_number`-th failure; the first
    /// failure is always retried immediately
    pub fn wait_time(&self, retry_number: u32) -> Duration {
        if retry_number == 1 {
            Duration::ZERO
        } else {
            self.backoff.wait_time(retry_number)
        }
    }

    /// Run `operation` until it succeeds or the policy gives up
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_observed(operation, |_, _, _| {}).await
    }

    /// Like [`execute`](Self::execute), calling `before_wait` with
    /// `(failed_attempt, wait, error)` right before each sleep
    ///
    /// The observer cannot influence the outcome. The error handed back on
    /// failure is always the last one the operation produced.
    pub async fn execute_observed<T, F, Fut, W>(
        &self,
        mut operation: F,
        mut before_wait: W,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        W: FnMut(u32, Duration, &E),
    {
        let mut failures = 0u32;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if let Some(is_transient) = &self.is_transient
                && !is_transient(&error)
            {
                return Err(error);
            }

            failures += 1;
            if failures >= self.max_attempts {
                return Err(error);
            }

            let wait = self.wait_time(failures);
            before_wait(failures, wait, &error);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
    }
}
