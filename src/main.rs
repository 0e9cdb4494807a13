//! Visit schedule service
//!
//! Fetches the venue's published visit schedule, parses it into per-date
//! visits and serves them over HTTP from a tiered cache.
//!
//! Module structure:
//! - `domain/` - Core types (Visit, DayRecord, VisitResult) and date handling
//! - `io/` - External interfaces (upstream fetchers, markup scanner, HTTP, rendering)
//! - `services/` - Parser, refresher, cache and its store
//! - `infra/` - Infrastructure (Config, Clock, Metrics)

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use visit_schedule::domain::dates::today_in;
use visit_schedule::infra::{CacheMetrics, Clock, Config, SystemClock};
use visit_schedule::io::http::{start_server, AppState};
use visit_schedule::io::upstream::build_fetcher;
use visit_schedule::services::{CacheConfig, MemoryStore, ScheduleCache, ScheduleRefresher};

/// Visit schedule service
#[derive(Parser, Debug)]
#[command(name = "visit-schedule", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default INFO level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "visit-schedule starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        bind_address = %config.bind_address(),
        port = %config.port(),
        source = %config.upstream_source().as_str(),
        timezone = %config.timezone(),
        max_age_secs = %config.cache_max_age().num_seconds(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let metrics = Arc::new(CacheMetrics::new());
    let fetcher = build_fetcher(&config)?;
    let refresher = Arc::new(ScheduleRefresher::new(fetcher, clock.clone(), &config));
    let store = Arc::new(MemoryStore::new(config.cache_max_entries()));
    let cache = Arc::new(ScheduleCache::new(
        store.clone(),
        refresher,
        clock.clone(),
        CacheConfig::from(&config),
        metrics.clone(),
    ));

    // Populate both tiers before taking traffic
    let today = today_in(config.timezone(), clock.now());
    let warmed = cache.warm(today).await;
    info!(date = %today, dates_stored = %warmed, "cache_warmed");

    // Metrics reporter also flushes store expirations
    let reporter_metrics = metrics.clone();
    let reporter_store = store.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    let mut reporter_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    reporter_metrics.report().log();
                    reporter_store.run_pending_tasks();
                    info!(entries = %reporter_store.len(), "cache_store_size");
                }
                _ = reporter_shutdown.changed() => break,
            }
        }
    });

    let state = Arc::new(AppState {
        cache,
        clock,
        timezone: config.timezone(),
        metrics,
        source: config.upstream_source().as_str().to_string(),
    });

    let addr: SocketAddr = format!("{}:{}", config.bind_address(), config.port()).parse()?;

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    start_server(addr, state, shutdown_rx).await?;

    info!("visit-schedule shutdown complete");
    Ok(())
}
