use crate::aggregator::ResultSet;
use crate::api::CatalogApi;
use crate::cancel::{run_with_cancel, CancellationState};
use crate::persistence::RecordSink;
use crate::pipeline::PipelineState;
use crate::rate_limit::RateLimitCoordinator;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::summary::ErrorTally;
use crate::types::{Identified, Page};
use crate::{CatalogError, FailureKind, Result};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Everything a stage worker needs, shared by `Arc` across all three stages.
pub struct StageContext {
    pub api: Arc<dyn CatalogApi>,
    pub retry: RetryConfig,
    pub page_size: u32,
    pub flush_on_throttle: bool,
    pub coordinator: Arc<RateLimitCoordinator>,
    pub cancel: CancellationState,
    pub results: Arc<ResultSet>,
    pub sink: Arc<dyn RecordSink>,
    pub tally: ErrorTally,
    state: watch::Sender<PipelineState>,
    fatal: Mutex<Option<CatalogError>>,
    flushed_for: Mutex<Option<Instant>>,
}

impl StageContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn CatalogApi>,
        retry: RetryConfig,
        page_size: u32,
        flush_on_throttle: bool,
        coordinator: Arc<RateLimitCoordinator>,
        cancel: CancellationState,
        results: Arc<ResultSet>,
        sink: Arc<dyn RecordSink>,
        state: watch::Sender<PipelineState>,
    ) -> Self {
        Self {
            api,
            retry,
            page_size,
            flush_on_throttle,
            coordinator,
            cancel,
            results,
            sink,
            tally: ErrorTally::new(),
            state,
            fatal: Mutex::new(None),
            flushed_for: Mutex::new(None),
        }
    }

    /// Move the pipeline forward to `next`. Never moves it backwards.
    pub fn advance(&self, next: PipelineState) {
        let advanced = self.state.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
        if advanced {
            log::info!("Pipeline state: {next:?}");
        }
    }

    /// Swallow a branch-level failure.
    ///
    /// The failure is logged and counted; only an auth failure goes further,
    /// cancelling the whole run and being kept for [`take_fatal`](Self::take_fatal).
    pub fn absorb(&self, branch: &str, error: CatalogError) {
        self.tally.record(error.kind());

        match error.kind() {
            FailureKind::Cancelled => log::debug!("{branch}: cancelled"),
            FailureKind::Auth => {
                log::error!("{branch}: {error}; cancelling the run");
                self.cancel.cancel();
                let mut fatal = self
                    .fatal
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if fatal.is_none() {
                    *fatal = Some(error);
                }
            }
            _ => log::warn!("Dropping {branch}: {error}"),
        }
    }

    /// The first fatal error of the run, if any.
    pub fn take_fatal(&self) -> Option<CatalogError> {
        self.fatal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Flush the result set, absorbing sink failures so the run keeps going.
    pub fn flush(&self, reason: &str) {
        match self.results.flush(self.sink.as_ref()) {
            Ok(written) => log::info!("Flushed {written} records ({reason})"),
            Err(e) => {
                log::warn!("Flush ({reason}) failed: {e}");
                self.tally.record(e.kind());
            }
        }
    }

    /// Hold back new work while the API is throttling us.
    ///
    /// With `flush_on_throttle`, the first stage to see a cooldown flushes;
    /// stages that see the same cooldown later do not flush again.
    pub async fn pause_if_throttled(&self, stage: &str) -> Result<()> {
        if self.flush_on_throttle {
            if let Some(until) = self.coordinator.throttled_until() {
                if self.claim_throttle_flush(until) {
                    self.flush("rate limited");
                }
            }
        }
        if let Some(slept) = self.coordinator.pause_if_throttled(&self.cancel).await? {
            log::info!("{stage}: paused {slept:?} for rate limit cooldown");
        }
        Ok(())
    }

    fn claim_throttle_flush(&self, until: Instant) -> bool {
        let mut flushed_for = self
            .flushed_for
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if flushed_for.is_some_and(|flushed| flushed >= until) {
            return false;
        }
        *flushed_for = Some(until);
        true
    }

    /// Run one request under the shared retry policy, raising the coordinator on every 429.
    pub async fn fetch_with_retry<T, F, Fut>(&self, operation: &str, fetch: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let events = self.coordinator.events().cloned();
        let coordinator = &self.coordinator;
        let outcome = retry_with_backoff(
            &self.retry,
            operation,
            &self.cancel,
            &events,
            fetch,
            |hint| coordinator.raise(hint),
        )
        .await?;
        Ok(outcome.result)
    }

    /// Walk an offset/limit listing and hand every item id downstream.
    ///
    /// Pages are fetched one at a time; a short page ends the walk. Items with
    /// an empty id are skipped. A closed downstream channel ends the walk
    /// without error. Returns the number of ids sent.
    pub async fn paginate<T, F, Fut>(
        &self,
        label: &str,
        fetch_page: F,
        downstream: &mpsc::Sender<String>,
    ) -> Result<u64>
    where
        T: Identified,
        F: Fn(u32, u32) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let limit = self.page_size;
        let mut offset = 0u32;
        let mut sent = 0u64;

        loop {
            self.pause_if_throttled(label).await?;

            let operation = format!("{label} (offset {offset})");
            let page = self
                .fetch_with_retry(&operation, || fetch_page(offset, limit))
                .await?;
            log::debug!("{operation}: {} items", page.items.len());

            for item in &page.items {
                let id = item.id().trim();
                if id.is_empty() {
                    log::warn!("{label}: skipping item with empty id");
                    continue;
                }
                if run_with_cancel(&self.cancel, downstream.send(id.to_string()))
                    .await?
                    .is_err()
                {
                    log::debug!("{label}: downstream closed, stopping");
                    return Ok(sent);
                }
                sent += 1;
            }

            if !page.has_more(limit) {
                return Ok(sent);
            }
            offset = offset.saturating_add(limit);
        }
    }
}
