//! Per-source token-bucket rate limiter
//!
//! Admission control for upstream API calls. Each source adapter owns one
//! limiter sized to that provider's published limit. The bucket refills
//! continuously (fractional units accumulate across sub-second checks) and
//! couples itself to upstream health: consecutive reported failures stretch
//! the wait between attempts even though the nominal refill rate is
//! unchanged.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Failure exponent cap: waits never exceed 2^5 = 32x the base interval
const MAX_BACKOFF_EXP: u32 = 5;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    consecutive_failures: u32,
}

/// Token bucket with failure-coupled backoff
///
/// Capacity `C` over a window of `window_secs` gives a refill rate of
/// `C / window_secs` units per second. `wait_for_unit` never starves:
/// refill is unconditional, so a unit is always eventually granted.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(capacity: u32, window_secs: u64) -> Self {
        let capacity = capacity.max(1) as f64;
        Self {
            capacity,
            refill_per_sec: capacity / window_secs.max(1) as f64,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                consecutive_failures: 0,
            }),
        }
    }

    /// Consume one unit if available. Non-blocking.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        Self::refill(&mut state, self.refill_per_sec, self.capacity);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Suspend the calling task until a unit is granted.
    ///
    /// Explicit bounded loop with one sleep per iteration; the sleep length
    /// is the base per-unit interval scaled by the failure backoff.
    pub async fn wait_for_unit(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            tokio::time::sleep(self.backoff_delay()).await;
        }
    }

    /// Whole units currently available
    pub fn available(&self) -> u32 {
        let mut state = self.state.lock().unwrap();
        Self::refill(&mut state, self.refill_per_sec, self.capacity);
        state.tokens.floor() as u32
    }

    /// Reset the failure counter after a successful upstream call
    pub fn report_success(&self) {
        self.state.lock().unwrap().consecutive_failures = 0;
    }

    /// Record an upstream failure, stretching subsequent waits
    pub fn report_failure(&self) {
        let mut state = self.state.lock().unwrap();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().unwrap().consecutive_failures
    }

    /// Wait applied when the bucket is empty:
    /// `(1/R) * 1000 * 2^min(failures, 5)` milliseconds.
    pub fn backoff_delay(&self) -> Duration {
        let failures = self.state.lock().unwrap().consecutive_failures;
        let base_ms = 1000.0 / self.refill_per_sec;
        let multiplier = 2u64.pow(failures.min(MAX_BACKOFF_EXP)) as f64;
        Duration::from_millis((base_ms * multiplier) as u64)
    }

    fn refill(state: &mut BucketState, refill_per_sec: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * refill_per_sec).min(capacity);
            state.last_refill = now;
        }
    }
}
