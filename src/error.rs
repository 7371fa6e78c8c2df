use crate::config::MAX_COOLDOWN;
use std::time::Duration;
use thiserror::Error;

/// Error types for catalog export operations.
///
/// This enum covers everything that can go wrong while talking to the remote
/// catalog API or persisting results: network issues, authentication failures,
/// throttling, unexpected statuses, and malformed payloads.
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use artist_catalog::{CatalogApi, CatalogClient, CatalogError};
///
/// #[tokio::main]
/// async fn main() {
///     let http_client = http_client::native::NativeClient::new();
///     let client = CatalogClient::new(
///         Box::new(http_client),
///         "https://api.spotify.com/v1",
///         "token",
///     );
///
///     match client.track("3n3Ppam7vgaVa1iaRUc9Lp").await {
///         Ok(record) => println!("Fetched {}", record.name),
///         Err(CatalogError::Auth { status, .. }) => eprintln!("Token rejected ({status})"),
///         Err(CatalogError::RateLimit { retry_after }) => {
///             eprintln!("Rate limited, retry in {retry_after:?}");
///         }
///         Err(e) => eprintln!("Other error: {e}"),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum CatalogError {
    /// HTTP/network related errors.
    ///
    /// This includes connection failures, timeouts, DNS errors, and other
    /// low-level networking issues. These are treated as transient.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The bearer token was rejected (401/403).
    ///
    /// No further progress is possible without a valid token, so this aborts
    /// the whole run rather than a single branch.
    #[error("Authentication failed ({status}): {message}")]
    Auth {
        /// HTTP status code returned by the API
        status: u16,
        /// Response body or short explanation
        message: String,
    },

    /// Rate limiting from the catalog API (HTTP 429).
    ///
    /// `retry_after` carries the server's `Retry-After` hint, zero if absent.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimit {
        /// Cooldown requested by the server
        retry_after: Duration,
    },

    /// Any other non-success status. Not retried.
    #[error("Unexpected status {status} from {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Failed to decode the JSON body of a response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Invalid configuration or input.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// File system I/O errors, mostly from the output sink.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used for end-of-run error accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// Retry budget exhausted while the API kept answering 429
    RateLimited,
    /// Connection errors and timeouts
    Network,
    /// Permanent non-success statuses (404, 500, ...)
    Remote,
    /// Malformed JSON
    Decode,
    /// Token rejected
    Auth,
    /// Work abandoned because the run was cancelled
    Cancelled,
    /// Local failures (configuration, I/O)
    Local,
}

impl CatalogError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CatalogError::Http(_) => FailureKind::Network,
            CatalogError::Auth { .. } => FailureKind::Auth,
            CatalogError::RateLimit { .. } => FailureKind::RateLimited,
            CatalogError::Status { .. } => FailureKind::Remote,
            CatalogError::Parse(_) => FailureKind::Decode,
            CatalogError::Cancelled => FailureKind::Cancelled,
            CatalogError::Config(_) | CatalogError::Io(_) => FailureKind::Local,
        }
    }

    /// Whether the retry policy should try the same request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::RateLimit { .. } | CatalogError::Http(_))
    }

    /// Server cooldown hint carried by this error, zero for everything but 429.
    pub fn cooldown_hint(&self) -> Duration {
        match self {
            CatalogError::RateLimit { retry_after } => (*retry_after).min(MAX_COOLDOWN),
            _ => Duration::ZERO,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::Auth { .. })
    }
}
