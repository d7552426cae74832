//! Bounded retry with exponential backoff and jitter
//!
//! Every upstream call runs through `with_retry`. Transient failures back
//! off exponentially (with jitter so parallel callers do not re-align),
//! capped at a max delay; permanent failures abort immediately. When
//! attempts are exhausted the last error propagates to the caller.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Errors that know whether another attempt could help
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for crate::error::SourceError {
    fn is_retryable(&self) -> bool {
        crate::error::SourceError::is_retryable(self)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Nominal delay before attempt `attempt + 1` (0-based), capped
    fn delay_for(&self, attempt: u32) -> u64 {
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        exp.min(self.max_delay_ms)
    }
}

/// Run `op` until it succeeds, it fails permanently, or attempts run out.
///
/// The last error is returned as-is so the caller can classify it.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !err.is_retryable() || attempt >= policy.max_attempts {
                    return Err(err);
                }

                let nominal = policy.delay_for(attempt - 1);
                // Jitter: 50-100% of the nominal delay
                let jittered = nominal / 2 + rand::thread_rng().gen_range(0..=nominal / 2);
                log::warn!(
                    "⏳ {} attempt {}/{} failed ({}), retrying in {}ms",
                    label,
                    attempt,
                    policy.max_attempts,
                    err,
                    jittered
                );
                sleep(Duration::from_millis(jittered)).await;
            }
        }
    }
}
