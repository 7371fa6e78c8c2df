//! # Rate Limiting Events
//!
//! This module provides a broadcast channel system for emitting rate limiting events
//! that consumers can listen to and react appropriately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

/// Events emitted while the export pipeline is being throttled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RateLimitEvent {
    /// The catalog API asked us to slow down.
    Detected {
        /// The timestamp when the rate limit was detected
        timestamp: DateTime<Utc>,
        /// Cooldown requested by the server
        cooldown: Duration,
        /// Number of raises seen so far in this run
        raised_count: u64,
    },
    /// A retry is about to begin after a backoff sleep
    RetryStarting {
        /// The timestamp when the backoff started
        timestamp: DateTime<Utc>,
        /// The operation being retried
        operation: String,
        /// The backoff before this retry
        delay: Duration,
        /// The retry attempt number (1-based)
        attempt: u32,
        /// Maximum number of retry attempts
        max_attempts: u32,
    },
    /// A retried operation eventually succeeded
    RetrySucceeded {
        /// The timestamp when the retry succeeded
        timestamp: DateTime<Utc>,
        /// The operation that was retried
        operation: String,
        /// The retry attempt number that succeeded (1-based)
        attempt: u32,
        /// Total backoff across all retries
        total_delay: Duration,
    },
    /// Retries exhausted; the branch will be dropped
    RetriesExhausted {
        /// The timestamp when retries were exhausted
        timestamp: DateTime<Utc>,
        /// The operation that gave up
        operation: String,
        /// The final retry attempt number that failed
        final_attempt: u32,
        /// Total backoff across all failed retries
        total_delay: Duration,
    },
}

/// A handle for receiving rate limiting events from the pipeline.
///
/// # Examples
///
/// ```rust,no_run
/// use artist_catalog::RateLimitEvent;
/// use tokio::sync::broadcast::error::RecvError;
///
/// async fn watch(mut receiver: artist_catalog::RateLimitEventReceiver) {
///     loop {
///         match receiver.recv().await {
///             Ok(RateLimitEvent::Detected { cooldown, .. }) => {
///                 println!("Throttled for {cooldown:?}");
///             }
///             Ok(other) => println!("{other:?}"),
///             Err(RecvError::Closed) => break,
///             Err(RecvError::Lagged(skipped)) => println!("{skipped} events skipped"),
///         }
///     }
/// }
/// ```
pub type RateLimitEventReceiver = broadcast::Receiver<RateLimitEvent>;

/// A handle for sending rate limiting events.
pub type RateLimitEventSender = broadcast::Sender<RateLimitEvent>;

/// Creates a new broadcast channel for rate limiting events.
///
/// The channel has a capacity of 100 events.
pub fn create_rate_limit_channel() -> (RateLimitEventSender, RateLimitEventReceiver) {
    broadcast::channel(100)
}

/// Helper trait for emitting rate limiting events.
pub trait RateLimitEventEmitter {
    fn emit_rate_limit_detected(&self, cooldown: Duration, raised_count: u64);

    fn emit_retry_starting(&self, operation: &str, delay: Duration, attempt: u32, max_attempts: u32);

    fn emit_retry_succeeded(&self, operation: &str, attempt: u32, total_delay: Duration);

    fn emit_retries_exhausted(&self, operation: &str, final_attempt: u32, total_delay: Duration);
}

impl RateLimitEventEmitter for Option<RateLimitEventSender> {
    fn emit_rate_limit_detected(&self, cooldown: Duration, raised_count: u64) {
        if let Some(sender) = self {
            let event = RateLimitEvent::Detected {
                timestamp: Utc::now(),
                cooldown,
                raised_count,
            };
            let _ = sender.send(event); // Ignore send errors (no receivers)
        }
    }

    fn emit_retry_starting(&self, operation: &str, delay: Duration, attempt: u32, max_attempts: u32) {
        if let Some(sender) = self {
            let event = RateLimitEvent::RetryStarting {
                timestamp: Utc::now(),
                operation: operation.to_string(),
                delay,
                attempt,
                max_attempts,
            };
            let _ = sender.send(event);
        }
    }

    fn emit_retry_succeeded(&self, operation: &str, attempt: u32, total_delay: Duration) {
        if let Some(sender) = self {
            let event = RateLimitEvent::RetrySucceeded {
                timestamp: Utc::now(),
                operation: operation.to_string(),
                attempt,
                total_delay,
            };
            let _ = sender.send(event);
        }
    }

    fn emit_retries_exhausted(&self, operation: &str, final_attempt: u32, total_delay: Duration) {
        if let Some(sender) = self {
            let event = RateLimitEvent::RetriesExhausted {
                timestamp: Utc::now(),
                operation: operation.to_string(),
                final_attempt,
                total_delay,
            };
            let _ = sender.send(event);
        }
    }
}
