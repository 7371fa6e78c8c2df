use artist_catalog::{
    CatalogClient, CatalogError, DelimitedFileSink, ExportConfig, Pipeline, RateLimitEvent,
    RateLimitEventReceiver, TokenStore,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Export an artist's full catalog to a delimited file
#[derive(Parser)]
#[command(
    name = "artist-catalog",
    about = "Export an artist's full catalog to a delimited file",
    long_about = None
)]
struct Cli {
    /// Catalog id of the artist to export
    artist_id: String,

    /// Items requested per page (1-50)
    #[arg(long)]
    page_size: Option<u32>,

    /// Output file (defaults to CATALOG_OUTPUT_FILE or output.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show detailed debug information
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = match ExportConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(2);
        }
    };
    if let Some(page_size) = args.page_size {
        config = config.with_page_size(page_size);
    }
    if let Some(output) = args.output {
        config = config.with_output_path(output);
    }
    if let Err(e) = config.validate() {
        eprintln!("❌ {e}");
        std::process::exit(2);
    }

    let token = match TokenStore::bearer_token() {
        Ok(token) => token,
        Err(e) => {
            eprintln!("❌ {e}");
            eprintln!();
            eprintln!("Provide a bearer token in one of these ways:");
            eprintln!("  export CATALOG_ACCESS_TOKEN=\"your_token\"");
            eprintln!("  export CATALOG_TOKEN_FILE=/path/to/token.json");
            std::process::exit(1);
        }
    };

    let client = CatalogClient::new(
        Box::new(http_client::native::NativeClient::new()),
        &config.base_url,
        &token,
    )
    .with_request_timeout(config.request_timeout);
    let output_path = config.output_path.clone();
    let sink = Arc::new(DelimitedFileSink::new(&output_path));
    let pipeline = Pipeline::new(Arc::new(client), config, sink);

    let cancel = pipeline.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing in-flight work and flushing");
            cancel.cancel();
        }
    });

    tokio::spawn(log_rate_limit_events(pipeline.rate_limit_events()));

    match pipeline.run(&args.artist_id).await {
        Ok(summary) => {
            println!("✅ {}", summary.summary_message());
            println!("📄 Output stored in {}", output_path.display());
            Ok(())
        }
        Err(e @ CatalogError::Auth { .. }) => {
            eprintln!("❌ {e}");
            eprintln!("Partial output stored in {}", output_path.display());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ Export failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Log cooldowns until the pipeline is dropped. Returns how many were logged.
async fn log_rate_limit_events(mut events: RateLimitEventReceiver) -> u64 {
    let mut logged = 0;
    loop {
        match events.recv().await {
            Ok(RateLimitEvent::Detected { cooldown, .. }) => {
                log::info!("⏳ Rate limited, cooling down for {cooldown:?}");
                logged += 1;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                log::debug!("Rate limit event logger lagged, {skipped} events skipped");
            }
            Err(RecvError::Closed) => return logged,
        }
    }
}
