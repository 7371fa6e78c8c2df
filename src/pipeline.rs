use crate::aggregator::ResultSet;
use crate::api::CatalogApi;
use crate::cancel::CancellationState;
use crate::discovery::{expand_albums, fetch_track_details, AlbumDiscovery, StageContext};
use crate::events::{create_rate_limit_channel, RateLimitEventReceiver, RateLimitEventSender};
use crate::persistence::RecordSink;
use crate::rate_limit::RateLimitCoordinator;
use crate::summary::ExportSummary;
use crate::{CatalogError, ExportConfig, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// Where an export run currently is. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    /// Album discovery is running
    Discovering,
    /// Track discovery workers are active
    Expanding,
    /// Track detail workers are active
    Detailing,
    /// All ids are discovered; waiting for in-flight detail fetches
    Draining,
    /// Final flush done
    Done,
}

/// Orchestrates one export run: albums → tracks → full records → sink.
///
/// A `Pipeline` is good for a single [`run`](Self::run); build a new one per artist.
///
/// # Examples
///
/// ```rust,no_run
/// use artist_catalog::{CatalogClient, DelimitedFileSink, ExportConfig, Pipeline, TokenStore};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> artist_catalog::Result<()> {
///     let config = ExportConfig::from_env()?;
///     let client = CatalogClient::new(
///         Box::new(http_client::native::NativeClient::new()),
///         &config.base_url,
///         &TokenStore::bearer_token()?,
///     );
///     let sink = Arc::new(DelimitedFileSink::new(&config.output_path));
///
///     let pipeline = Pipeline::new(Arc::new(client), config, sink);
///     let summary = pipeline.run("0OdUWJ0sBjDrqHygGUXeCF").await?;
///     println!("{}", summary.summary_message());
///     Ok(())
/// }
/// ```
pub struct Pipeline {
    api: Arc<dyn CatalogApi>,
    config: ExportConfig,
    sink: Arc<dyn RecordSink>,
    cancel: CancellationState,
    events: RateLimitEventSender,
    state: watch::Sender<PipelineState>,
    results: Arc<ResultSet>,
    started: AtomicBool,
}

impl Pipeline {
    pub fn new(api: Arc<dyn CatalogApi>, config: ExportConfig, sink: Arc<dyn RecordSink>) -> Self {
        let (events, _rx) = create_rate_limit_channel();
        let (state, _state_rx) = watch::channel(PipelineState::Discovering);
        Self {
            api,
            config,
            sink,
            cancel: CancellationState::new(),
            events,
            state,
            results: Arc::new(ResultSet::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Handle for stopping the run from outside. A cancelled run still flushes.
    pub fn cancellation(&self) -> CancellationState {
        self.cancel.clone()
    }

    /// Subscribe to rate limit and retry events.
    pub fn rate_limit_events(&self) -> RateLimitEventReceiver {
        self.events.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Records collected so far.
    pub fn results(&self) -> Arc<ResultSet> {
        self.results.clone()
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export the full catalog of `artist_id`.
    ///
    /// Branch failures are logged, counted in the returned summary and
    /// otherwise ignored. An authentication failure cancels the run; whatever
    /// was collected is still flushed and the auth error is returned. An
    /// external cancel also flushes, and reports `cancelled` in the summary.
    ///
    /// Calling `run` a second time on the same pipeline is a config error.
    pub async fn run(&self, artist_id: &str) -> Result<ExportSummary> {
        let artist_id = artist_id.trim();
        if artist_id.is_empty() {
            return Err(CatalogError::Config("artist id must not be empty".to_string()));
        }
        self.config.validate()?;
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CatalogError::Config(
                "pipeline has already run; build a new one per export".to_string(),
            ));
        }

        let started = Instant::now();
        log::info!("Starting export for artist {artist_id}");

        let coordinator = Arc::new(RateLimitCoordinator::with_events(self.events.clone()));
        let ctx = Arc::new(StageContext::new(
            self.api.clone(),
            self.config.retry.clone(),
            self.config.page_size,
            self.config.flush_on_throttle,
            coordinator.clone(),
            self.cancel.clone(),
            self.results.clone(),
            self.sink.clone(),
            self.state.clone(),
        ));

        let (album_tx, album_rx) = mpsc::channel(1);
        let (track_tx, track_rx) = mpsc::channel(1);

        let albums = AlbumDiscovery::new(ctx.clone(), artist_id.to_string()).run(album_tx);
        let expand = expand_albums(
            ctx.clone(),
            album_rx,
            track_tx,
            self.config.concurrency.album_workers,
        );
        let details = fetch_track_details(
            ctx.clone(),
            track_rx,
            self.config.concurrency.track_workers,
        );
        let stages = async {
            let ((), albums_discovered, details) = futures::join!(albums, expand, details);
            (albums_discovered, details)
        };

        let (albums_discovered, details) = match self.config.flush_interval {
            Some(interval) => with_periodic_flush(&ctx, interval, stages).await,
            None => stages.await,
        };

        ctx.advance(PipelineState::Draining);
        let final_flush = self.results.flush(self.sink.as_ref());
        ctx.advance(PipelineState::Done);
        let records_written = final_flush?;

        let summary = ExportSummary {
            artist_id: artist_id.to_string(),
            albums_discovered,
            tracks_discovered: details.dispatched,
            duplicate_tracks: details.duplicates,
            records_written,
            rate_limit_raises: coordinator.raised_count(),
            flushes: self.results.flush_count(),
            errors: ctx.tally.summary(),
            elapsed: started.elapsed(),
            cancelled: self.cancel.is_cancelled(),
        };
        log::info!("{}", summary.summary_message());

        match ctx.take_fatal() {
            Some(fatal) => Err(fatal),
            None => Ok(summary),
        }
    }
}

/// Drive `stages` to completion, flushing every `interval` in the meantime.
async fn with_periodic_flush<F: Future>(
    ctx: &StageContext,
    interval: Duration,
    stages: F,
) -> F::Output {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(stages);

    loop {
        tokio::select! {
            output = &mut stages => return output,
            _ = ticker.tick() => ctx.flush("periodic"),
        }
    }
}
