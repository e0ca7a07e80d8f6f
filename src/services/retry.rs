//! Bounded retries for units of work that lose a lock race.
//!
//! Anything that opens a [`UnitOfWork`](crate::store::UnitOfWork) can hit a
//! lock timeout, reported as [`AppError::Transient`]. [`RetryPolicy::run`]
//! retries those with exponential backoff and turns an exhausted budget into
//! [`AppError::Conflict`]. Every other outcome is returned as is.

use std::{future::Future, time::Duration};

use tracing::warn;

use crate::error::AppError;

/// How transient storage failures are retried before giving up with `Conflict`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    /// Exponential backoff for the given retry (1-based) plus up to one base
    /// interval of random jitter.
    fn delay(&self, retry: u32) -> Duration {
        let base_ms = u64::try_from(self.base_backoff.as_millis()).unwrap_or(u64::MAX);
        let exp_ms = base_ms.saturating_mul(1_u64 << retry.saturating_sub(1).min(16));
        let jitter_ms = if base_ms == 0 {
            0
        } else {
            rand::random_range(0..base_ms)
        };

        Duration::from_millis(exp_ms.saturating_add(jitter_ms))
    }

    /// Run `attempt` until it succeeds, fails for a non-transient reason, or
    /// the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, attempt: F) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut retries = 0;

        loop {
            match attempt().await {
                Err(AppError::Transient) if retries < self.max_retries => {
                    retries += 1;
                    let delay = self.delay(retries);
                    warn!(
                        operation,
                        retry = retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient storage conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(AppError::Transient) => {
                    warn!(operation, retries, "retries exhausted");
                    return Err(AppError::Conflict);
                }
                other => return other,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(20))
    }
}
