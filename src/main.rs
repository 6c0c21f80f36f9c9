//! Markets Stream - Entry Point
//!
//! Loads configuration, builds the market data multiplexer over the
//! in-process feeds and runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate (path from `MARKETS_STREAM_CONFIG`)
//! 2. Init tracing (JSON structured logging)
//! 3. Build strategy registry, metrics registry and the multiplexer
//! 4. Create all feeds (candles, order book, trades, ticker)
//! 5. Spawn metrics server, health server and market event logger
//! 6. Spawn JSONL replay if configured
//! 7. Spawn config watcher; reconcile bots on every reload
//! 8. Wait for SIGINT, then destroy the multiplexer

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use markets_stream::adapters::feeds::{replay_file, LocalFeedFactory};
use markets_stream::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use markets_stream::adapters::strategy::StrategyRegistry;
use markets_stream::config::hot_reload::ConfigWatcher;
use markets_stream::config::{self, AppConfig};
use markets_stream::domain::MarketEvent;
use markets_stream::ports::strategy::StrategyResolver;
use markets_stream::usecases::{BotReconciler, MarketsStream, StreamOptions};

const CONFIG_ENV: &str = "MARKETS_STREAM_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ────────────────────────────────
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".to_string());
    let config = config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        strategies = config.strategies.len(),
        bots = config.bots.len(),
        "Starting markets stream"
    );

    // ── 3. Shutdown signal channel ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Build registries and the multiplexer ─────────────
    let registry = Arc::new(StrategyRegistry::new(config.strategies.clone()));
    let strategies: Arc<dyn StrategyResolver> = registry.clone();
    info!(templates = ?registry.templates(), "Strategy registry loaded");

    let metrics = if config.metrics.enabled {
        Some(Arc::new(MetricsRegistry::new().context("Failed to create metrics registry")?))
    } else {
        None
    };

    let bots = config.enabled_bots();
    let factory = LocalFeedFactory::new(Arc::clone(&strategies));
    let stream = MarketsStream::new(
        &factory,
        &bots,
        Arc::clone(&strategies),
        StreamOptions {
            capacity: config.service.market_channel_capacity,
            metrics: metrics.clone(),
        },
    );
    let mut reconciler = BotReconciler::new(&bots);
    if let Some(metrics) = &metrics {
        reconciler = reconciler.with_metrics(Arc::clone(metrics));
    }

    // ── 5. Create all feeds ─────────────────────────────────
    stream.create().await.context("Failed to create feeds")?;

    let health = Arc::new(HealthState::new());
    health.feeds_created.store(true, Ordering::Release);

    // ── 6. Spawn metrics, health and event logger tasks ─────
    let mut handles = Vec::new();

    if let Some(metrics) = &metrics {
        let metrics = Arc::clone(metrics);
        let bind_address = config.metrics.bind_address.clone();
        let shutdown = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = metrics.serve(bind_address, shutdown).await {
                error!(error = %e, "Metrics server failed");
            }
        }));
    }

    let health_server = HealthServer::new(Arc::clone(&health), config.metrics.health_port);
    let health_shutdown = shutdown_tx.subscribe();
    handles.push(tokio::spawn(async move {
        if let Err(e) = health_server.run(health_shutdown).await {
            error!(error = %e, "Health server failed");
        }
    }));

    handles.push(tokio::spawn(log_market_events(
        stream.subscribe(),
        shutdown_tx.subscribe(),
    )));

    // ── 7. Spawn replay if configured ───────────────────────
    if let Some(replay) = config.replay.clone() {
        let feeds = stream.feeds().clone();
        let pace = (replay.pace_ms > 0).then(|| Duration::from_millis(replay.pace_ms));
        handles.push(tokio::spawn(async move {
            if let Err(e) = replay_file(&replay.path, &feeds, pace).await {
                error!(error = %e, "Replay failed");
            }
        }));
    }

    // ── 8. Spawn config watcher ─────────────────────────────
    let mut current_strategies = config.strategies.clone();
    let (mut watcher, mut config_rx) = ConfigWatcher::new(&config_path, config);
    let watcher_shutdown = shutdown_tx.subscribe();
    handles.push(tokio::spawn(async move {
        if let Err(e) = watcher.run(watcher_shutdown).await {
            error!(error = %e, "Config watcher failed");
        }
    }));

    info!("All tasks spawned, markets stream is running");

    // ── 9. Reconcile on reload until SIGINT ─────────────────
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("SIGINT received, initiating graceful shutdown");
                break;
            }
            changed = config_rx.changed() => {
                if changed.is_err() {
                    warn!("Config watcher stopped");
                    break;
                }
                let updated: AppConfig = config_rx.borrow_and_update().clone();
                if updated.strategies != current_strategies {
                    info!(templates = updated.strategies.len(), "Strategy definitions changed");
                    registry.replace(updated.strategies.clone());
                    debug!(templates = ?registry.templates(), "Strategy registry replaced");
                    current_strategies = updated.strategies.clone();
                    reconciler.mark_stale();
                }
                reconciler.reconcile(&stream, &updated.bots).await;
            }
        }
    }

    // ── Graceful shutdown ───────────────────────────────────
    health.shutting_down.store(true, Ordering::Release);
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    stream.destroy();

    for handle in handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Log every market event at debug level until shutdown or until the
/// multiplexer is destroyed.
async fn log_market_events(
    mut events: broadcast::Receiver<MarketEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            received = events.recv() => match received {
                Ok(MarketEvent::CandleClosed { candle, market_id, .. }) => debug!(
                    market = %market_id,
                    opened_at = ?candle.opened_at(),
                    close = %candle.close,
                    "Candle closed"
                ),
                Ok(MarketEvent::OrderbookChange { orderbook, market_id }) => debug!(
                    market = %market_id,
                    best_bid = ?orderbook.best_bid(),
                    best_ask = ?orderbook.best_ask(),
                    "Order book changed"
                ),
                Ok(event) => debug!(
                    event = event.type_name(),
                    market = %event.market_id(),
                    "Market event"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Market event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
