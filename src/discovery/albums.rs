use super::common::StageContext;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sequential paginator over the albums of one artist.
///
/// The album list is walked page by page on a single task; every album id is
/// handed to the track discovery dispatcher as soon as its page arrives.
pub struct AlbumDiscovery {
    ctx: Arc<StageContext>,
    artist_id: String,
}

impl AlbumDiscovery {
    pub fn new(ctx: Arc<StageContext>, artist_id: String) -> Self {
        Self { ctx, artist_id }
    }

    /// Run to completion. Dropping `albums` on return closes the channel.
    pub async fn run(self, albums: mpsc::Sender<String>) {
        let api = self.ctx.api.as_ref();
        let artist_id = self.artist_id.as_str();
        let label = format!("albums of artist {artist_id}");

        let outcome = self
            .ctx
            .paginate(
                &label,
                move |offset, limit| api.artist_albums_page(artist_id, offset, limit),
                &albums,
            )
            .await;

        match outcome {
            Ok(sent) => log::info!("Album discovery for {artist_id} finished: {sent} albums"),
            Err(e) => self.ctx.absorb(&label, e),
        }
    }
}
