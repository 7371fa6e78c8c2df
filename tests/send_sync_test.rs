use artist_catalog::{
    CatalogApi, CatalogClient, ExportConfig, MemorySink, Pipeline, RateLimitCoordinator, ResultSet,
};
use http_client::native::NativeClient;
use std::sync::Arc;

fn assert_send<T: Send>(_: T) {}
fn assert_send_sync<T: Send + Sync>() {}

/// Test that client futures are Send so they can run on worker tasks.
#[tokio::test]
async fn test_client_futures_are_send() {
    let client = CatalogClient::new(
        Box::new(NativeClient::new()),
        "https://api.spotify.com/v1",
        "token",
    );

    assert_send(client.artist_albums_page("X", 0, 50));
    assert_send(client.album_tracks_page("A1", 0, 50));
    assert_send(client.track("T1"));
}

/// Test that a whole run can be spawned onto the multi-threaded runtime.
#[tokio::test]
async fn test_pipeline_run_is_send() {
    let client = CatalogClient::new(
        Box::new(NativeClient::new()),
        "https://api.spotify.com/v1",
        "token",
    );
    let pipeline = Pipeline::new(
        Arc::new(client),
        ExportConfig::new(),
        Arc::new(MemorySink::new()),
    );

    assert_send(pipeline.run("X"));
}

#[test]
fn test_shared_types_are_send_sync() {
    assert_send_sync::<CatalogClient>();
    assert_send_sync::<Pipeline>();
    assert_send_sync::<ResultSet>();
    assert_send_sync::<RateLimitCoordinator>();
    assert_send_sync::<Arc<dyn CatalogApi>>();
}
