use crate::{CatalogError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Cooperative cancellation shared by every stage of an export run.
///
/// This is intentionally simple:
/// - `cancel()` flips a boolean and wakes sleepers and in-flight requests.
/// - Long waits select on either their own completion or cancellation.
#[derive(Clone, Debug)]
pub struct CancellationState {
    tx: watch::Sender<bool>,
}

impl Default for CancellationState {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolves once the state is cancelled.
    pub async fn cancelled(&self) {
        wait_for_cancel(self.subscribe()).await
    }
}

async fn wait_for_cancel(mut cancel_rx: watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow_and_update() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            // Sender dropped; nothing can cancel us any more.
            std::future::pending::<()>().await;
        }
    }
}

pub async fn sleep_with_cancel(cancel: &CancellationState, duration: Duration) -> Result<()> {
    run_with_cancel(cancel, tokio::time::sleep(duration)).await
}

/// Drive `fut` to completion unless the run is cancelled first.
pub async fn run_with_cancel<F>(cancel: &CancellationState, fut: F) -> Result<F::Output>
where
    F: Future,
{
    if cancel.is_cancelled() {
        return Err(CatalogError::Cancelled);
    }

    let cancel_rx = cancel.subscribe();
    tokio::pin!(fut);
    tokio::select! {
        output = &mut fut => Ok(output),
        _ = wait_for_cancel(cancel_rx) => Err(CatalogError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_cancel() {
        let cancel = CancellationState::new();
        let start = tokio::time::Instant::now();
        sleep_with_cancel(&cancel, Duration::from_secs(3))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let cancel = CancellationState::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let start = tokio::time::Instant::now();
        let result = sleep_with_cancel(&cancel, Duration::from_secs(600)).await;
        assert!(matches!(result, Err(CatalogError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_already_cancelled_short_circuits() {
        let cancel = CancellationState::new();
        cancel.cancel();
        let result = run_with_cancel(&cancel, async { 42 }).await;
        assert!(matches!(result, Err(CatalogError::Cancelled)));

        // Clones share the flag.
        let other = CancellationState::new();
        let clone = other.clone();
        assert_eq!(run_with_cancel(&clone, async { 42 }).await.unwrap(), 42);
        other.cancel();
        assert!(clone.is_cancelled());
    }
}
