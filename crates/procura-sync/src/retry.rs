//! Per-call retry policy for remote workflow calls.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::api::ApiError;

/// How a failed call is retried. Only [retryable](ApiError::is_retryable)
/// errors are retried; everything else fails on the first attempt.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RetryPolicy {
    /// Single attempt.
    #[default]
    None,
    /// Up to `max_attempts` attempts, `delay` apart.
    Fixed { max_attempts: u32, delay: Duration },
    /// Up to `max_attempts` attempts; the delay starts at `initial`, grows by
    /// `multiplier` per attempt and is capped at `max`.
    Exponential {
        max_attempts: u32,
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } | Self::Exponential { max_attempts, .. } => {
                (*max_attempts).max(1)
            }
        }
    }

    /// Delay before retry number `attempt` (1 = first retry).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed { delay, .. } => *delay,
            Self::Exponential {
                initial,
                max,
                multiplier,
                ..
            } => {
                let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = initial.as_secs_f64() * multiplier.powi(exp);
                Duration::from_secs_f64(secs.min(max.as_secs_f64()).max(0.0))
            }
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. The last error is returned.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max = self.max_attempts();
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < max => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(call = what, attempt, max_attempts = max, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        debug!(call = what, attempts = attempt, "giving up");
                    }
                    return Err(e);
                }
            }
        }
    }
}
