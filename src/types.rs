//! Data types for the catalog export.
//!
//! Album and track references drive the discovery stages; [`FullTrackRecord`]
//! is the terminal entity that ends up in the output file.

use serde::{Deserialize, Serialize};

// ================================================================================================
// STAGE REFERENCES
// ================================================================================================

/// Minimal projection of an album, enough to drive track discovery.
///
/// # Examples
///
/// ```rust
/// use artist_catalog::AlbumRef;
///
/// let album: AlbumRef = serde_json::from_str(r#"{"id": "4aawyAB9vmqN3uQ7FjRGTy", "name": "Global Warming"}"#).unwrap();
/// assert_eq!(album.id, "4aawyAB9vmqN3uQ7FjRGTy");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumRef {
    /// Remote album identifier
    pub id: String,
    /// Album title, only used for logging
    #[serde(default)]
    pub name: String,
}

/// Minimal projection of a track, enough to drive the detail stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackRef {
    /// Remote track identifier
    pub id: String,
    /// Track title, only used for logging
    #[serde(default)]
    pub name: String,
}

/// Anything with a remote identifier that can be emitted between stages.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for AlbumRef {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for TrackRef {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One page of a paginated collection endpoint.
///
/// Only `items` is required; the paging metadata is informational and the
/// pipeline decides whether to continue from the item count alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items on this page
    pub items: Vec<T>,
    /// Offset the server applied
    #[serde(default)]
    pub offset: u32,
    /// Page size the server applied
    #[serde(default)]
    pub limit: u32,
    /// Total number of items in the collection, if reported
    #[serde(default)]
    pub total: Option<u32>,
    /// URL of the next page, if reported
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// A page shorter than the requested size is the last one.
    pub fn has_more(&self, requested_page_size: u32) -> bool {
        !self.items.is_empty() && self.items.len() as u32 >= requested_page_size
    }
}

// ================================================================================================
// FULL TRACK RECORD
// ================================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub ean: Option<String>,
    #[serde(default)]
    pub upc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimplifiedArtist {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

/// The album a track belongs to, as embedded in the full track payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimplifiedAlbum {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub album_type: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde(default)]
    pub available_markets: Vec<String>,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub release_date_precision: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

/// Flattened track metadata as returned by the single-track endpoint.
///
/// This is the unit that gets persisted. Fields missing from the payload
/// fall back to their defaults instead of failing the whole record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FullTrackRecord {
    /// Remote track identifier
    pub id: String,
    /// Track title
    #[serde(default)]
    pub name: String,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,
    /// Popularity score (0-100)
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub disc_number: u32,
    #[serde(default)]
    pub track_number: u32,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub external_ids: ExternalIds,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    /// Parent album
    #[serde(default)]
    pub album: SimplifiedAlbum,
    /// Performing artists
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    /// Markets where the track can be played
    #[serde(default)]
    pub available_markets: Vec<String>,
    #[serde(default)]
    pub is_playable: Option<bool>,
    #[serde(default)]
    pub is_local: bool,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

impl FullTrackRecord {
    /// Artist names in credit order.
    pub fn artist_names(&self) -> Vec<&str> {
        self.artists.iter().map(|a| a.name.as_str()).collect()
    }
}
