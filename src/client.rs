use crate::api::CatalogApi;
use crate::config::MAX_COOLDOWN;
use crate::{AlbumRef, CatalogError, FullTrackRecord, Page, Result, TrackRef};
use async_trait::async_trait;
use http_client::{HttpClient, Request, Response};
use http_types::{Method, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// HTTP implementation of [`CatalogApi`] for a Spotify-style Web API.
///
/// A single client is shared by every worker; the underlying [`HttpClient`]
/// pools connections, so no locking is needed here.
///
/// # Examples
///
/// ```rust,no_run
/// use artist_catalog::{CatalogApi, CatalogClient, Result};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let http_client = http_client::native::NativeClient::new();
///     let client = CatalogClient::new(Box::new(http_client), "https://api.spotify.com/v1", "token");
///
///     let page = client.artist_albums_page("0OdUWJ0sBjDrqHygGUXeCF", 0, 50).await?;
///     for album in page.items {
///         println!("{} ({})", album.name, album.id);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct CatalogClient {
    client: Arc<dyn HttpClient>,
    base_url: String,
    access_token: String,
    request_timeout: Duration,
}

impl CatalogClient {
    /// Create a new [`CatalogClient`].
    ///
    /// # Arguments
    ///
    /// * `client` - Any HTTP client implementation that implements [`HttpClient`]
    /// * `base_url` - API root, e.g. `https://api.spotify.com/v1`
    /// * `access_token` - Bearer token sent with every request
    pub fn new(client: Box<dyn HttpClient>, base_url: &str, access_token: &str) -> Self {
        Self {
            client: Arc::from(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, path: &str, offset: u32, limit: u32) -> String {
        format!("{}{path}?offset={offset}&limit={limit}", self.base_url)
    }

    /// Issue one authenticated GET and decode a JSON body.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut response = self.get(url).await?;
        let status: u16 = response.status().into();

        match status {
            200 => {
                let body = response
                    .body_string()
                    .await
                    .map_err(|e| CatalogError::Http(e.to_string()))?;
                serde_json::from_str(&body).map_err(|e| {
                    log::debug!("Could not decode response from {url}: {e}");
                    CatalogError::Parse(format!("{url}: {e}"))
                })
            }
            429 => {
                let retry_after = retry_after_hint(&response);
                log::debug!("Got 429 from {url}, Retry-After {retry_after:?}");
                Err(CatalogError::RateLimit { retry_after })
            }
            401 | 403 => {
                let message = response
                    .body_string()
                    .await
                    .unwrap_or_else(|e| e.to_string());
                Err(CatalogError::Auth { status, message })
            }
            _ => {
                if let Ok(body) = response.body_string().await {
                    log::debug!("Error {status} from {url}: {body}");
                }
                Err(CatalogError::Status {
                    status,
                    url: url.to_string(),
                })
            }
        }
    }

    /// Make an authenticated HTTP GET request, bounded by the request timeout.
    async fn get(&self, url: &str) -> Result<Response> {
        let parsed = url
            .parse::<Url>()
            .map_err(|e| CatalogError::Config(format!("invalid URL {url}: {e}")))?;

        let mut request = Request::new(Method::Get, parsed);
        request.insert_header("Authorization", format!("Bearer {}", self.access_token));
        request.insert_header("Accept", "application/json");

        log::debug!("GET {url}");
        match tokio::time::timeout(self.request_timeout, self.client.send(request)).await {
            Ok(response) => response.map_err(|e| CatalogError::Http(e.to_string())),
            Err(_) => Err(CatalogError::Http(format!(
                "request to {url} timed out after {:?}",
                self.request_timeout
            ))),
        }
    }
}

/// `Retry-After` in whole seconds, capped at [`MAX_COOLDOWN`]; missing or
/// malformed headers mean no hint.
fn retry_after_hint(response: &Response) -> Duration {
    response
        .header("retry-after")
        .and_then(|h| h.get(0))
        .and_then(|v| v.as_str().trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_COOLDOWN))
        .unwrap_or(Duration::ZERO)
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn artist_albums_page(
        &self,
        artist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<AlbumRef>> {
        let path = format!("/artists/{}/albums", urlencoding::encode(artist_id));
        let url = self.collection_url(&path, offset, limit);
        log::debug!("Fetching albums of artist {artist_id} at offset {offset}");
        self.get_json(&url).await
    }

    async fn album_tracks_page(
        &self,
        album_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackRef>> {
        let path = format!("/albums/{}/tracks", urlencoding::encode(album_id));
        let url = self.collection_url(&path, offset, limit);
        log::debug!("Fetching tracks of album {album_id} at offset {offset}");
        self.get_json(&url).await
    }

    async fn track(&self, track_id: &str) -> Result<FullTrackRecord> {
        let url = format!("{}/tracks/{}", self.base_url, urlencoding::encode(track_id));
        self.get_json(&url).await
    }
}
