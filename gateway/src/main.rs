mod config;
mod connectivity;
mod db;
mod errors;
mod metrics;
mod model;
mod rest;

use axum::{routing::get, Router};
use config::Config;
use connectivity::{HostProbe, TcpStatusSource};
use db::PgLinkStore;
use rest::AppState;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{CancelHandle, DeviceLinker, SeriesCache};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting grain telemetry gateway");
    info!("HTTP server: {}", config.http_addr);
    info!(
        "Database: {}",
        config.database_url.split('@').last().unwrap_or("***")
    );
    info!(
        "Link policy: {} attempts, base delay {:?}, max delay {:?}, {:?} fields",
        config.link_policy.max_attempts,
        config.link_policy.base_delay,
        config.link_policy.max_delay,
        config.link_policy.required
    );
    info!("Connectivity mode: {:?}", config.connectivity_mode);
    info!(
        "Series cache: {} entries, ttl {:?}",
        config.series_cache_capacity, config.series_cache_ttl
    );

    // Initialize metrics
    metrics::init_metrics();

    let pool = match db::make_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    let source = TcpStatusSource::new(
        config.store_probe_addr.clone(),
        config.reachability_probe_addr.clone(),
        config.probe_timeout,
    );
    let linker = DeviceLinker::new(
        HostProbe::new(config.connectivity_mode, source),
        PgLinkStore::new(pool),
        config.link_policy.clone(),
    );

    let shutdown = CancelHandle::new();
    let state = AppState {
        linker: Arc::new(linker),
        series_cache: Arc::new(SeriesCache::new(
            config.series_cache_capacity,
            config.series_cache_ttl,
        )),
        shutdown: shutdown.signal(),
        max_threshold: config.series_max_threshold,
    };

    // Periodically drop stale chart series
    let cache = state.series_cache.clone();
    let purge_every = config.series_cache_ttl.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        loop {
            ticker.tick().await;
            cache.purge_expired();
        }
    });

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(state));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", config.http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", config.http_addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cancelling pending device links");
        shutdown.cancel();
    });

    if let Err(e) = server.await {
        error!("HTTP server error: {}", e);
    }

    info!("Shutting down");
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
