use crate::cancel::{run_with_cancel, sleep_with_cancel, CancellationState};
use crate::events::{RateLimitEventEmitter, RateLimitEventSender};
use crate::{CatalogError, Result};
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts per logical request
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub min_backoff: Duration,
    /// Ceiling for the exponential term (the server hint is added on top)
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a config with retries disabled
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create a config with custom retry count
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a config with custom delays
    pub fn with_delays(min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            min_backoff,
            max_backoff,
            ..Default::default()
        }
    }
}

/// Backoff for a given attempt: `min(max_backoff, min_backoff * 2^attempt) + hint`.
///
/// If the exponential term overflows it is clamped to `max_backoff`; the
/// server hint is always added after clamping.
pub fn compute_backoff(
    attempt: u32,
    min_backoff: Duration,
    max_backoff: Duration,
    server_cooldown_hint: Duration,
) -> Duration {
    let exponential = 2u32
        .checked_pow(attempt)
        .and_then(|factor| min_backoff.checked_mul(factor))
        .map_or(max_backoff, |delay| delay.min(max_backoff));
    exponential.saturating_add(server_cooldown_hint)
}

/// Per-request retry bookkeeping. Created fresh for every logical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub computed_duration: Duration,
}

impl RetryState {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            min_backoff: config.min_backoff,
            max_backoff: config.max_backoff,
            computed_duration: Duration::ZERO,
        }
    }

    /// Advance to the next attempt and compute how long to wait before it.
    pub fn next_backoff(&mut self, server_cooldown_hint: Duration) -> Duration {
        self.attempt += 1;
        self.computed_duration = compute_backoff(
            self.attempt,
            self.min_backoff,
            self.max_backoff,
            server_cooldown_hint,
        );
        self.computed_duration
    }
}

/// Result of a retry operation with context
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The successful result
    pub result: T,
    /// Number of retry attempts made
    pub attempts_made: u32,
    /// Total time spent sleeping between attempts
    pub total_retry_time: Duration,
}

/// Execute an async operation with retry logic for throttling and transient failures
///
/// Rate limit (429) and network errors are retried with exponential backoff;
/// anything else is returned to the caller immediately. Every attempt and every
/// sleep observes `cancel`.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name of the operation for logging
/// * `cancel` - Cancellation shared with the rest of the run
/// * `events` - Optional sink for rate limit events
/// * `operation` - Async function that returns a Result
/// * `on_rate_limit` - Callback invoked with the server hint on every 429
pub async fn retry_with_backoff<T, F, Fut, OnRateLimit>(
    config: &RetryConfig,
    operation_name: &str,
    cancel: &CancellationState,
    events: &Option<RateLimitEventSender>,
    mut operation: F,
    mut on_rate_limit: OnRateLimit,
) -> Result<RetryResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    OnRateLimit: FnMut(Duration),
{
    let mut state = RetryState::new(config);
    let mut total_retry_time = Duration::ZERO;

    loop {
        match run_with_cancel(cancel, operation()).await? {
            Ok(result) => {
                if state.attempt > 0 {
                    events.emit_retry_succeeded(operation_name, state.attempt, total_retry_time);
                }
                return Ok(RetryResult {
                    result,
                    attempts_made: state.attempt,
                    total_retry_time,
                });
            }
            Err(error) if error.is_retryable() => {
                let hint = error.cooldown_hint();
                if let CatalogError::RateLimit { .. } = error {
                    on_rate_limit(hint);
                }

                if state.attempt >= config.max_retries {
                    log::warn!(
                        "Max retries ({}) exceeded for {} operation: {}",
                        config.max_retries,
                        operation_name,
                        error
                    );
                    events.emit_retries_exhausted(operation_name, state.attempt, total_retry_time);
                    return Err(error);
                }

                let delay = state.next_backoff(hint);
                log::info!(
                    "{} failed ({}). Waiting {:?} before retry {} of {}",
                    operation_name,
                    error,
                    delay,
                    state.attempt,
                    config.max_retries
                );
                events.emit_retry_starting(operation_name, delay, state.attempt, config.max_retries);

                sleep_with_cancel(cancel, delay).await?;
                total_retry_time = total_retry_time.saturating_add(delay);
            }
            Err(other_error) => {
                return Err(other_error);
            }
        }
    }
}
