use crate::cancel::{sleep_with_cancel, CancellationState};
use crate::config::MAX_COOLDOWN;
use crate::events::{RateLimitEventEmitter, RateLimitEventSender};
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Process-wide advisory throttle shared by every stage.
///
/// Any worker that sees a 429 calls [`raise`](Self::raise); dispatch loops
/// check [`remaining`](Self::remaining) before spawning new work and sleep out
/// the cooldown. The throttled-until instant only moves forward, so a raise that
/// races with a check can delay convergence but never shortens a cooldown.
#[derive(Debug, Default)]
pub struct RateLimitCoordinator {
    throttled_until: Mutex<Option<Instant>>,
    raised: AtomicU64,
    events: Option<RateLimitEventSender>,
}

impl RateLimitCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: RateLimitEventSender) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    /// Signal that the API asked for a cooldown. Never blocks for long.
    ///
    /// Cooldowns longer than [`MAX_COOLDOWN`] are clamped.
    pub fn raise(&self, cooldown: Duration) {
        let cooldown = cooldown.min(MAX_COOLDOWN);
        let now = Instant::now();
        let until = now.checked_add(cooldown).unwrap_or(now);
        {
            let mut guard = self
                .throttled_until
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match *guard {
                Some(current) if current >= until => {}
                _ => *guard = Some(until),
            }
        }

        let raised_count = self.raised.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("Rate limit raised for {cooldown:?} (raise #{raised_count})");
        self.events.emit_rate_limit_detected(cooldown, raised_count);
    }

    /// End of the cooldown still in effect, if any.
    pub fn throttled_until(&self) -> Option<Instant> {
        let guard = self
            .throttled_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.filter(|until| *until > Instant::now())
    }

    /// Cooldown still in effect, if any.
    pub fn remaining(&self) -> Option<Duration> {
        let guard = self
            .throttled_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .and_then(|until| until.checked_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }

    pub fn is_throttled(&self) -> bool {
        self.remaining().is_some()
    }

    /// Total number of raises observed.
    pub fn raised_count(&self) -> u64 {
        self.raised.load(Ordering::Relaxed)
    }

    /// Sleep out the current cooldown, if one is signaled.
    ///
    /// Returns the duration slept, or `None` when the API is not throttling us.
    pub async fn pause_if_throttled(&self, cancel: &CancellationState) -> Result<Option<Duration>> {
        match self.remaining() {
            Some(cooldown) => {
                sleep_with_cancel(cancel, cooldown).await?;
                Ok(Some(cooldown))
            }
            None => Ok(None),
        }
    }

    pub fn events(&self) -> Option<&RateLimitEventSender> {
        self.events.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{create_rate_limit_channel, RateLimitEvent};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_raise_then_expire() {
        let coordinator = RateLimitCoordinator::new();
        assert!(!coordinator.is_throttled());

        coordinator.raise(Duration::from_secs(2));
        assert!(coordinator.is_throttled());
        assert_eq!(coordinator.remaining(), Some(Duration::from_secs(2)));

        assert!(coordinator.throttled_until().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(coordinator.remaining(), None);
        assert_eq!(coordinator.throttled_until(), None);
        assert_eq!(coordinator.raised_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_raise_never_shrinks_cooldown() {
        let coordinator = RateLimitCoordinator::new();
        coordinator.raise(Duration::from_secs(10));
        coordinator.raise(Duration::from_secs(1));
        assert_eq!(coordinator.remaining(), Some(Duration::from_secs(10)));

        coordinator.raise(Duration::from_secs(15));
        assert_eq!(coordinator.remaining(), Some(Duration::from_secs(15)));
        assert_eq!(coordinator.raised_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_cooldown_is_clamped() {
        let coordinator = RateLimitCoordinator::new();
        coordinator.raise(Duration::MAX);
        assert_eq!(coordinator.remaining(), Some(MAX_COOLDOWN));

        coordinator.raise(Duration::from_secs(u64::MAX));
        assert_eq!(coordinator.remaining(), Some(MAX_COOLDOWN));
        assert_eq!(coordinator.raised_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_sleeps_for_observed_cooldown() {
        let coordinator = RateLimitCoordinator::new();
        let cancel = CancellationState::new();

        assert_eq!(coordinator.pause_if_throttled(&cancel).await.unwrap(), None);

        coordinator.raise(Duration::from_secs(3));
        let start = Instant::now();
        let slept = coordinator.pause_if_throttled(&cancel).await.unwrap();
        assert_eq!(slept, Some(Duration::from_secs(3)));
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(!coordinator.is_throttled());
    }

    #[tokio::test]
    async fn test_concurrent_raises_are_all_counted() {
        let coordinator = Arc::new(RateLimitCoordinator::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator.raise(Duration::from_millis(100 + i));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(coordinator.raised_count(), 50);
        assert!(coordinator.is_throttled());
    }

    #[tokio::test]
    async fn test_raise_emits_event() {
        let (tx, mut rx) = create_rate_limit_channel();
        let coordinator = RateLimitCoordinator::with_events(tx);
        coordinator.raise(Duration::from_secs(5));

        match rx.recv().await.unwrap() {
            RateLimitEvent::Detected { cooldown, .. } => {
                assert_eq!(cooldown, Duration::from_secs(5))
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
