//! Quakewatch - live earthquake monitor
//!
//! Serves the latest USGS feed snapshot as JSON and as a server-sent event
//! stream, with a small dashboard at `/`.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use quakewatch::config::Config;
use quakewatch::feed::UsgsFeed;
use quakewatch::hub::BroadcastHub;
use quakewatch::query::QueryService;
use quakewatch::refresher::Refresher;
use quakewatch::store::SnapshotStore;
use quakewatch::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;

    // Use LOG_FORMAT=gcp for structured GCP Cloud Logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase()));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Quakewatch...");
    info!("Configuration loaded");

    let store = Arc::new(SnapshotStore::new());
    let source = Arc::new(UsgsFeed::new(&config.feed)?);
    let refresher = Refresher::new(store.clone(), source, &config.feed);
    let monitor = refresher.monitor();
    let hub = Arc::new(BroadcastHub::new(store.clone(), &config.broadcast));

    // Initial fill before serving; a failure here still starts the service
    if let Err(e) = refresher.refresh_once().await {
        warn!("Initial feed fetch failed, serving empty snapshot: {}", e);
    }

    let shutdown = CancellationToken::new();
    let refresher_task = refresher.start(shutdown.clone());
    let hub_task = hub.clone().start(shutdown.clone());

    let state = Arc::new(AppState {
        query: QueryService::new(store),
        hub,
        monitor,
        shutdown: shutdown.clone(),
        keep_alive: config.broadcast.keep_alive(),
    });

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    let served = web::start_server(&config.listen_addr(), state, shutdown.clone()).await;

    // Stop both timers before the store goes away
    shutdown.cancel();
    let _ = tokio::join!(refresher_task, hub_task);
    info!("Quakewatch stopped");

    served?;
    Ok(())
}
