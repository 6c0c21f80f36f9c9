//! Prometheus Metrics Registry - Multiplexer Observability
//!
//! Registers and exposes Prometheus metrics on `/metrics`. Covers event
//! throughput per feed kind, registration outcomes, feed creation latency
//! and the number of tracked bots.

use std::sync::Arc;

use anyhow::Context;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::domain::FeedKind;

/// Centralized Prometheus metrics for the multiplexer.
///
/// All metrics follow the naming convention `markets_stream_*` and carry
/// a `kind` label where they relate to one feed.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Market events published, by feed kind.
    pub events_published: IntCounterVec,
    /// Per-kind `add_bot` outcomes (`registered`, `failed`).
    pub feed_registrations: IntCounterVec,
    /// Feed `create()` latency in seconds.
    pub feed_create_seconds: HistogramVec,
    /// Bots currently tracked by the reconciler.
    pub bots: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_published = IntCounterVec::new(
            Opts::new(
                "markets_stream_events_total",
                "Market events published to subscribers",
            ),
            &["kind"],
        )?;

        let feed_registrations = IntCounterVec::new(
            Opts::new(
                "markets_stream_feed_registrations_total",
                "Bot registrations forwarded to feed streams",
            ),
            &["kind", "outcome"],
        )?;

        let feed_create_seconds = HistogramVec::new(
            HistogramOpts::new(
                "markets_stream_feed_create_seconds",
                "Time spent opening a feed stream's channels",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["kind"],
        )?;

        let bots = IntGauge::new("markets_stream_bots", "Bots currently tracked")?;

        registry.register(Box::new(events_published.clone()))?;
        registry.register(Box::new(feed_registrations.clone()))?;
        registry.register(Box::new(feed_create_seconds.clone()))?;
        registry.register(Box::new(bots.clone()))?;

        Ok(Self {
            registry,
            events_published,
            feed_registrations,
            feed_create_seconds,
            bots,
        })
    }

    pub fn record_event(&self, kind: FeedKind) {
        self.events_published.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn record_registration(&self, kind: FeedKind, ok: bool) {
        let outcome = if ok { "registered" } else { "failed" };
        self.feed_registrations
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
    }

    pub fn observe_create(&self, kind: FeedKind, seconds: f64) {
        self.feed_create_seconds
            .with_label_values(&[kind.as_str()])
            .observe(seconds);
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not UTF-8")
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    metrics.render().map_err(|e| {
                        warn!(error = %e, "Metrics render failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    })
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}
