#![allow(dead_code)]
use artist_catalog::{
    AlbumRef, CatalogApi, CatalogError, FullTrackRecord, Page, Result, SimplifiedAlbum,
    SimplifiedArtist, TrackRef,
};
use async_trait::async_trait;
use http_client::{HttpClient, Request, Response};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const TEST_BASE_URL: &str = "http://catalog.test/v1";

// ================================================================================================
// SCRIPTED HTTP CLIENT
// ================================================================================================

#[derive(Debug, Clone)]
struct CannedResponse {
    status: u16,
    body: String,
    retry_after: Option<u64>,
}

#[derive(Debug, Default)]
struct Script {
    routes: Mutex<HashMap<String, VecDeque<CannedResponse>>>,
    requests: Mutex<Vec<String>>,
    authorizations: Mutex<Vec<Option<String>>>,
}

/// In-process [`HttpClient`] that answers from canned responses.
///
/// Routes are keyed by path (relative to [`TEST_BASE_URL`]) plus query string.
/// Responses for a route are served in order and the last one repeats.
/// Unknown routes get a 404.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHttpClient {
    script: Arc<Script>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, route: &str, status: u16, body: impl Into<String>) -> &Self {
        self.push(
            route,
            CannedResponse {
                status,
                body: body.into(),
                retry_after: None,
            },
        )
    }

    pub fn rate_limit(&self, route: &str, retry_after_secs: u64) -> &Self {
        self.push(
            route,
            CannedResponse {
                status: 429,
                body: String::new(),
                retry_after: Some(retry_after_secs),
            },
        )
    }

    /// Every request seen so far, as route keys.
    pub fn requests(&self) -> Vec<String> {
        self.script.requests.lock().unwrap().clone()
    }

    /// `Authorization` header of every request, in order.
    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.script.authorizations.lock().unwrap().clone()
    }

    pub fn request_count(&self, route: &str) -> usize {
        self.requests().iter().filter(|r| *r == route).count()
    }

    fn push(&self, route: &str, response: CannedResponse) -> &Self {
        self.script
            .routes
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(response);
        self
    }

    fn next_response(&self, route: &str) -> Option<CannedResponse> {
        let mut routes = self.script.routes.lock().unwrap();
        let queue = routes.get_mut(route)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn send(&self, req: Request) -> std::result::Result<Response, http_types::Error> {
        let url = req.url();
        let path = url.path().trim_start_matches("/v1");
        let route = match url.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        self.script.requests.lock().unwrap().push(route.clone());
        let authorization = req
            .header("Authorization")
            .and_then(|values| values.get(0))
            .map(|value| value.as_str().to_string());
        self.script.authorizations.lock().unwrap().push(authorization);

        let canned = self.next_response(&route).unwrap_or(CannedResponse {
            status: 404,
            body: r#"{"error": {"status": 404, "message": "Not found."}}"#.to_string(),
            retry_after: None,
        });

        let mut response = Response::new(canned.status);
        response.insert_header("Content-Type", "application/json");
        if let Some(secs) = canned.retry_after {
            response.insert_header("Retry-After", secs.to_string());
        }
        response.set_body(canned.body);
        Ok(response)
    }
}

// ================================================================================================
// JSON FIXTURES
// ================================================================================================

pub fn albums_json(ids: &[&str], offset: u32, limit: u32) -> String {
    let items: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "name": format!("Album {id}"), "album_type": "album"}))
        .collect();
    page_json(items, offset, limit)
}

pub fn tracks_json(ids: &[&str], offset: u32, limit: u32) -> String {
    let items: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "name": format!("Track {id}"), "track_number": 1}))
        .collect();
    page_json(items, offset, limit)
}

fn page_json(items: Vec<serde_json::Value>, offset: u32, limit: u32) -> String {
    serde_json::json!({
        "href": "http://catalog.test/v1/page",
        "items": items,
        "limit": limit,
        "next": null,
        "offset": offset,
        "previous": null,
        "total": items.len(),
    })
    .to_string()
}

pub fn track_json(id: &str, album_id: &str) -> String {
    serde_json::json!({
        "id": id,
        "name": format!("Track {id}"),
        "duration_ms": 201_000,
        "popularity": 42,
        "disc_number": 1,
        "track_number": 1,
        "explicit": false,
        "external_ids": {"isrc": format!("ISRC{id}")},
        "external_urls": {"spotify": format!("https://open.spotify.com/track/{id}")},
        "album": {"id": album_id, "name": format!("Album {album_id}"), "album_type": "album"},
        "artists": [{"id": "X", "name": "Artist X"}],
        "available_markets": ["US"],
        "is_local": false,
        "href": format!("http://catalog.test/v1/tracks/{id}"),
        "uri": format!("spotify:track:{id}"),
        "type": "track"
    })
    .to_string()
}

// ================================================================================================
// FAKE CATALOG
// ================================================================================================

/// Failure injected into [`FakeCatalog`] before the real answer is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injected {
    RateLimit(u64),
    Network,
    NotFound,
    Auth,
    Decode,
}

impl Injected {
    fn into_error(self, key: &str) -> CatalogError {
        match self {
            Injected::RateLimit(secs) => CatalogError::RateLimit {
                retry_after: Duration::from_secs(secs),
            },
            Injected::Network => CatalogError::Http("connection reset".to_string()),
            Injected::NotFound => CatalogError::Status {
                status: 404,
                url: key.to_string(),
            },
            Injected::Auth => CatalogError::Auth {
                status: 401,
                message: "The access token expired".to_string(),
            },
            Injected::Decode => CatalogError::Parse(format!("{key}: expected value")),
        }
    }
}

/// In-memory [`CatalogApi`] with paging, injected failures and call accounting.
#[derive(Default)]
pub struct FakeCatalog {
    albums: HashMap<String, Vec<String>>,
    tracks: HashMap<String, Vec<String>>,
    failures: Mutex<HashMap<String, VecDeque<Injected>>>,
    track_delay: Duration,
    track_delays: HashMap<String, Duration>,
    track_starts: Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artist(mut self, artist_id: &str, album_ids: &[&str]) -> Self {
        self.albums.insert(
            artist_id.to_string(),
            album_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    pub fn with_album(mut self, album_id: &str, track_ids: &[&str]) -> Self {
        self.tracks.insert(
            album_id.to_string(),
            track_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    /// Make every `track` call take this long, to observe concurrency.
    pub fn with_track_delay(mut self, delay: Duration) -> Self {
        self.track_delay = delay;
        self
    }

    /// Override the `track` delay for a single track.
    pub fn with_track_delay_for(mut self, track_id: &str, delay: Duration) -> Self {
        self.track_delays.insert(track_id.to_string(), delay);
        self
    }

    /// When each `track` call for `track_id` started, in call order.
    pub fn track_starts(&self, track_id: &str) -> Vec<Instant> {
        self.track_starts
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == track_id)
            .map(|(_, started)| *started)
            .collect()
    }

    /// Fail the next call for `key` (`artist:X`, `album:A1` or `track:T1`).
    ///
    /// A page of a listing can be targeted on its own with `artist:X@offset`.
    pub fn fail(self, key: &str, failure: Injected) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(failure);
        self
    }

    pub fn calls(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == key).count()
    }

    pub fn max_concurrent_track_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn check(&self, key: &str, offset: Option<u32>) -> Result<()> {
        self.calls.lock().unwrap().push(key.to_string());
        let mut failures = self.failures.lock().unwrap();
        let mut injected = None;
        if let Some(offset) = offset {
            injected = failures
                .get_mut(&format!("{key}@{offset}"))
                .and_then(|queue| queue.pop_front());
        }
        if injected.is_none() {
            injected = failures.get_mut(key).and_then(|queue| queue.pop_front());
        }
        drop(failures);
        match injected {
            Some(failure) => Err(failure.into_error(key)),
            None => Ok(()),
        }
    }

    fn page<T>(ids: &[String], offset: u32, limit: u32, make: impl Fn(&str) -> T) -> Page<T> {
        let items = ids
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|id| make(id))
            .collect();
        Page {
            items,
            offset,
            limit,
            total: Some(ids.len() as u32),
            next: None,
        }
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn artist_albums_page(
        &self,
        artist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<AlbumRef>> {
        self.check(&format!("artist:{artist_id}"), Some(offset))?;
        let ids = self.albums.get(artist_id).cloned().unwrap_or_default();
        Ok(Self::page(&ids, offset, limit, |id| AlbumRef {
            id: id.to_string(),
            name: format!("Album {id}"),
        }))
    }

    async fn album_tracks_page(
        &self,
        album_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackRef>> {
        self.check(&format!("album:{album_id}"), Some(offset))?;
        let ids = self.tracks.get(album_id).cloned().unwrap_or_default();
        Ok(Self::page(&ids, offset, limit, |id| TrackRef {
            id: id.to_string(),
            name: format!("Track {id}"),
        }))
    }

    async fn track(&self, track_id: &str) -> Result<FullTrackRecord> {
        self.track_starts
            .lock()
            .unwrap()
            .push((track_id.to_string(), Instant::now()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self
            .track_delays
            .get(track_id)
            .copied()
            .unwrap_or(self.track_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check(&format!("track:{track_id}"), None)?;
        let album_id = self
            .tracks
            .iter()
            .find(|(_, tracks)| tracks.iter().any(|t| t == track_id))
            .map(|(album, _)| album.clone())
            .unwrap_or_default();

        Ok(FullTrackRecord {
            id: track_id.to_string(),
            name: format!("Track {track_id}"),
            duration_ms: 180_000,
            album: SimplifiedAlbum {
                id: album_id.clone(),
                name: format!("Album {album_id}"),
                ..Default::default()
            },
            artists: vec![SimplifiedArtist {
                id: "X".to_string(),
                name: "Artist X".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        })
    }
}
