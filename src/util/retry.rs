//! Bounded retry with exponential backoff.
//!
//! Used for posting-surface calls made while the scheduling lock is held, so
//! the bound matters: every retry extends the lock hold.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Retry behaviour for transient failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom retry count and default delays.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Policy with explicit delays.
    pub fn with_delays(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            ..Self::default()
        }
    }

    /// Delay to wait before retry number `attempt` (1-based).
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponential =
            self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        Duration::from_millis((exponential as u64).min(self.max_delay_ms))
    }
}

/// Run `operation`, retrying while `should_retry` accepts the error and the
/// policy has attempts left. Returns the first success or the last error.
pub async fn with_retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                if !should_retry(&e) {
                    debug!(error = %e, "non-retryable error");
                    return Err(e);
                }
                if attempt >= policy.max_retries {
                    warn!(attempt, error = %e, "retries exhausted");
                    return Err(e);
                }
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "operation failed, will retry"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
