use crate::{AlbumRef, FullTrackRecord, Page, Result, TrackRef};
use async_trait::async_trait;

/// The three read endpoints the export pipeline needs.
///
/// Each method performs exactly one request and classifies the outcome into
/// [`CatalogError`](crate::CatalogError); retrying is the caller's job. The
/// pipeline only talks to this trait, so it can be driven by a fake in tests.
///
/// # Mocking Support
///
/// When the `mock` feature is enabled, this crate provides `MockCatalogApi`
/// that implements this trait using the `mockall` library.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// One page of the albums released by an artist.
    async fn artist_albums_page(
        &self,
        artist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<AlbumRef>>;

    /// One page of the tracks on an album.
    async fn album_tracks_page(
        &self,
        album_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackRef>>;

    /// The full record of a single track.
    async fn track(&self, track_id: &str) -> Result<FullTrackRecord>;
}
