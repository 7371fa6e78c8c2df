use super::common::StageContext;
use crate::cancel::run_with_cancel;
use crate::pipeline::PipelineState;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Lists the tracks of a single album and forwards their ids.
pub struct AlbumTracksDiscovery {
    ctx: Arc<StageContext>,
    album_id: String,
}

impl AlbumTracksDiscovery {
    pub fn new(ctx: Arc<StageContext>, album_id: String) -> Self {
        Self { ctx, album_id }
    }

    pub async fn run(self, tracks: mpsc::Sender<String>) {
        let api = self.ctx.api.as_ref();
        let album_id = self.album_id.as_str();
        let label = format!("tracks of album {album_id}");

        let outcome = self
            .ctx
            .paginate(
                &label,
                move |offset, limit| api.album_tracks_page(album_id, offset, limit),
                &tracks,
            )
            .await;

        match outcome {
            Ok(sent) => log::debug!("Album {album_id}: {sent} tracks"),
            Err(e) => self.ctx.absorb(&label, e),
        }
    }
}

/// Fan out one [`AlbumTracksDiscovery`] per album id, at most `workers` at a time.
///
/// Returns the number of albums dispatched. `tracks` is dropped once every
/// worker has finished, which closes the track id channel.
pub async fn expand_albums(
    ctx: Arc<StageContext>,
    mut albums: mpsc::Receiver<String>,
    tracks: mpsc::Sender<String>,
    workers: usize,
) -> u64 {
    let permits = Arc::new(Semaphore::new(workers));
    let mut running = JoinSet::new();
    let mut dispatched = 0u64;

    while let Some(album_id) = albums.recv().await {
        ctx.advance(PipelineState::Expanding);
        let permit = match run_with_cancel(&ctx.cancel, permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => break,
            Err(e) => {
                ctx.absorb(&format!("album {album_id}"), e);
                break;
            }
        };
        // A worker may have been throttled while we waited for the permit.
        if let Err(e) = ctx.pause_if_throttled("track discovery").await {
            ctx.absorb(&format!("album {album_id}"), e);
            break;
        }

        dispatched += 1;
        let worker = AlbumTracksDiscovery::new(ctx.clone(), album_id);
        let tracks = tracks.clone();
        running.spawn(async move {
            worker.run(tracks).await;
            drop(permit);
        });
    }

    // Closing the receiver unblocks the album paginator if we stopped early.
    drop(albums);

    while let Some(joined) = running.join_next().await {
        if let Err(e) = joined {
            log::error!("Track discovery worker failed: {e}");
        }
    }
    log::info!("Track discovery finished for {dispatched} albums");
    dispatched
}
