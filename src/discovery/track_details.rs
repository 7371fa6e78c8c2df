use super::common::StageContext;
use crate::cancel::run_with_cancel;
use crate::pipeline::PipelineState;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Fetches one full track record and appends it to the result set.
pub struct TrackDetailFetch {
    ctx: Arc<StageContext>,
    track_id: String,
}

impl TrackDetailFetch {
    pub fn new(ctx: Arc<StageContext>, track_id: String) -> Self {
        Self { ctx, track_id }
    }

    pub async fn run(self) {
        let api = self.ctx.api.as_ref();
        let track_id = self.track_id.as_str();
        let label = format!("track {track_id}");

        match self
            .ctx
            .fetch_with_retry(&label, || api.track(track_id))
            .await
        {
            Ok(record) => {
                log::debug!("Fetched {label}: {}", record.name);
                self.ctx.results.append(record);
            }
            Err(e) => self.ctx.absorb(&label, e),
        }
    }
}

/// Counts from the detail dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetailStats {
    /// Distinct track ids dispatched
    pub dispatched: u64,
    /// Ids already seen earlier in the run
    pub duplicates: u64,
}

/// Fan out one [`TrackDetailFetch`] per distinct track id, at most `workers` at a time.
pub async fn fetch_track_details(
    ctx: Arc<StageContext>,
    mut tracks: mpsc::Receiver<String>,
    workers: usize,
) -> DetailStats {
    let permits = Arc::new(Semaphore::new(workers));
    let mut running = JoinSet::new();
    let mut seen = HashSet::new();
    let mut stats = DetailStats::default();

    while let Some(track_id) = tracks.recv().await {
        ctx.advance(PipelineState::Detailing);
        if !seen.insert(track_id.clone()) {
            log::debug!("Track {track_id} already dispatched, skipping");
            stats.duplicates += 1;
            continue;
        }

        let permit = match run_with_cancel(&ctx.cancel, permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => break,
            Err(e) => {
                ctx.absorb(&format!("track {track_id}"), e);
                break;
            }
        };
        if let Err(e) = ctx.pause_if_throttled("track details").await {
            ctx.absorb(&format!("track {track_id}"), e);
            break;
        }

        stats.dispatched += 1;
        let worker = TrackDetailFetch::new(ctx.clone(), track_id);
        running.spawn(async move {
            worker.run().await;
            drop(permit);
        });
    }

    // Upstream is done; only in-flight detail fetches remain.
    drop(tracks);
    ctx.advance(PipelineState::Draining);

    while let Some(joined) = running.join_next().await {
        if let Err(e) = joined {
            log::error!("Track detail worker failed: {e}");
        }
    }
    log::info!(
        "Track details finished: {} dispatched, {} duplicates skipped",
        stats.dispatched,
        stats.duplicates
    );
    stats
}
