//! The three fetch stages of an export run and the plumbing they share.

pub mod album_tracks;
pub mod albums;
pub mod common;
pub mod track_details;

pub use album_tracks::{expand_albums, AlbumTracksDiscovery};
pub use albums::AlbumDiscovery;
pub use common::StageContext;
pub use track_details::{fetch_track_details, DetailStats, TrackDetailFetch};
