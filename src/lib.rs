//! # artist-catalog
//!
//! Export an artist's complete catalog from a paginated music API into a
//! delimited file.
//!
//! An export walks three levels of the catalog: the artist's albums, the
//! tracks of every album, and the full record of every track. Each level runs
//! as its own stage; ids flow between stages over channels and every stage
//! after the first fans out to a bounded pool of workers.
//!
//! ## Features
//!
//! - **Bounded concurrency**: one worker per album and per track, capped per stage
//! - **Rate limit coordination**: a 429 anywhere pauses new work everywhere
//! - **Retry with backoff**: throttling and network errors are retried with
//!   capped exponential backoff plus the server's `Retry-After`
//! - **Partial results**: failed branches are dropped and counted, and whatever
//!   was collected is flushed, even on cancellation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use artist_catalog::{CatalogClient, DelimitedFileSink, ExportConfig, Pipeline, Result};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ExportConfig::new().with_output_path("catalog.csv");
//!     let http_client = http_client::native::NativeClient::new();
//!     let client = CatalogClient::new(Box::new(http_client), &config.base_url, "token");
//!     let sink = Arc::new(DelimitedFileSink::new(&config.output_path));
//!
//!     let summary = Pipeline::new(Arc::new(client), config, sink)
//!         .run("0OdUWJ0sBjDrqHygGUXeCF")
//!         .await?;
//!     println!("{}", summary.summary_message());
//!     Ok(())
//! }
//! ```
//!
//! ## Rate Limit Events
//!
//! [`Pipeline::rate_limit_events`] returns a broadcast receiver of
//! [`RateLimitEvent`]s for progress reporting.

pub mod aggregator;
pub mod api;
pub mod cancel;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod persistence;
pub mod pipeline;
pub mod rate_limit;
pub mod retry;
pub mod summary;
pub mod token;
pub mod types;

pub use aggregator::ResultSet;
pub use api::CatalogApi;
#[cfg(feature = "mock")]
pub use api::MockCatalogApi;
pub use cancel::CancellationState;
pub use client::CatalogClient;
pub use config::{
    ConcurrencyConfig, ExportConfig, DEFAULT_BASE_URL, MAX_COOLDOWN, MAX_PAGE_SIZE,
};
pub use error::{CatalogError, FailureKind};
pub use events::{
    create_rate_limit_channel, RateLimitEvent, RateLimitEventReceiver, RateLimitEventSender,
};
pub use persistence::{DelimitedFileSink, MemorySink, RecordSink};
pub use pipeline::{Pipeline, PipelineState};
pub use rate_limit::RateLimitCoordinator;
pub use retry::{compute_backoff, RetryConfig, RetryResult, RetryState};
pub use summary::{ErrorSummary, ExportSummary};
pub use token::{StoredToken, TokenStore};
pub use types::{
    AlbumRef, ExternalIds, ExternalUrls, FullTrackRecord, Identified, Page, SimplifiedAlbum,
    SimplifiedArtist, TrackRef,
};

/// A convenience type alias for [`Result`] with [`CatalogError`] as the error type.
pub type Result<T> = std::result::Result<T, CatalogError>;
