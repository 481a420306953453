//! Exponential backoff with jitter, cancellation-aware sleep, and status
//! classification (spec §4.B). Grounded on `LLMProvider::chat_with_retry`'s
//! backoff math, generalized into a standalone driver so both the provider
//! transport and the MCP pool's connect loop can share it.

use crate::errors::FederationError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// `{max_retries, initial_delay, max_delay, multiplier}`. Invariant:
/// `initial_delay <= max_delay`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn is_valid(&self) -> bool {
        self.initial_delay <= self.max_delay && self.multiplier > 1.0
    }
}

/// `min(initial_delay * multiplier^(attempt-1), max_delay) + jitter`, where
/// jitter is uniform in `[0, 0.1 * base]`. `attempt` is 1-based.
///
/// Monotonically non-decreasing up to `max_delay + 0.1 * max_delay`; never
/// exceeds `max_delay * 1.1` (spec §8 universal invariant).
pub fn calculate_backoff(config: &RetryConfig, attempt: usize) -> Duration {
    debug_assert!(attempt >= 1, "attempt is 1-based");
    let exponent = (attempt - 1) as i32;
    let base_ms = (config.initial_delay.as_millis() as f64 * config.multiplier.powi(exponent))
        .min(config.max_delay.as_millis() as f64);
    let jitter_ms = base_ms * 0.1 * fastrand::f64();
    Duration::from_millis((base_ms + jitter_ms).round() as u64)
}

/// Outcome of one attempt, as classified by the caller's `op` closure.
pub enum Outcome<T> {
    /// Terminal success or a non-retryable failure: stop immediately.
    Done(Result<T, FederationError>),
    /// Transient failure: retry if attempts remain.
    Retry(FederationError),
}

/// Repeats `op` until it returns a non-retryable outcome or attempts are
/// exhausted, sleeping with cancellation-aware waits between attempts
/// (spec §4.B, §5 cancellation semantics).
///
/// `attempts` is the retry config's `max_retries`; the driver performs
/// `max_retries + 1` total invocations of `op` (spec §8: "exactly N+1 HTTP
/// attempts").
pub async fn drive<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, FederationError>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = Outcome<T>>,
{
    let mut last_error: Option<FederationError> = None;

    for attempt in 1..=(config.max_retries + 1) {
        if cancel.is_cancelled() {
            return Err(FederationError::Cancelled);
        }

        let outcome = tokio::select! {
            () = cancel.cancelled() => return Err(FederationError::Cancelled),
            outcome = op(attempt) => outcome,
        };

        match outcome {
            Outcome::Done(result) => return result,
            Outcome::Retry(err) => {
                warn!(attempt, max_retries = config.max_retries, error = %err, "retryable failure");
                let exhausted = attempt > config.max_retries;
                last_error = Some(err);
                if exhausted {
                    break;
                }
                let delay = calculate_backoff(config, attempt);
                debug!(?delay, "sleeping before retry");
                tokio::select! {
                    () = cancel.cancelled() => return Err(FederationError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    Err(FederationError::exhausted(
        last_error.unwrap_or_else(|| FederationError::Transport("no attempts made".into())),
    ))
}

#[cfg(test)]
mod tests;
